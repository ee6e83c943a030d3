use chrono::{DateTime, Utc};
use duka_common::Money;

use crate::db_types::{OrderPayment, PaymentStatus};

/// Strips every non-digit character. Garbage input yields an empty string.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// `max(0, total - amount_paid)`
pub fn compute_balance_due(total: Money, amount_paid: Money) -> Money {
    total.saturating_sub(amount_paid)
}

/// The authoritative paid amount of an order: the sum of every payment record whose status is exactly `paid`.
pub fn compute_amount_paid_from_payments<'a, I>(payments: I) -> Money
where I: IntoIterator<Item = &'a OrderPayment> {
    payments.into_iter().filter(|p| p.status == PaymentStatus::Paid).map(|p| p.amount).sum()
}

/// The most recent settlement time among the `paid` records, if any.
pub fn latest_paid_at<'a, I>(payments: I) -> Option<DateTime<Utc>>
where I: IntoIterator<Item = &'a OrderPayment> {
    payments
        .into_iter()
        .filter(|p| p.status == PaymentStatus::Paid)
        .map(|p| p.paid_at.unwrap_or(p.created_at))
        .max()
}
