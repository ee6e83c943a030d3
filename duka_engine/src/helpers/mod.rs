mod ids;
mod money;
mod payment_status;

pub use ids::{new_order_id, new_payment_id};
pub use money::{compute_amount_paid_from_payments, compute_balance_due, latest_paid_at, normalize_phone};
pub use payment_status::derive_payment_status;

/// The minimum number of digits a normalized phone number must have before it may be used as a lookup key.
pub const MIN_PHONE_DIGITS: usize = 6;

/// Returns the normalized phone number if it has at least [`MIN_PHONE_DIGITS`] digits.
pub fn valid_phone(raw: &str) -> Option<String> {
    let phone = normalize_phone(raw);
    (phone.len() >= MIN_PHONE_DIGITS).then_some(phone)
}
