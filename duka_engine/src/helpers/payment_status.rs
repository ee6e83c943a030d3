use duka_common::Money;

use crate::{
    db_types::{PaymentMethod, PaymentStatus},
    helpers::compute_balance_due,
};

/// Decides an order's canonical payment status from the aggregate of its payment history.
///
/// The first matching rule wins:
/// 1. Nothing left to pay on a non-zero total: `paid`.
/// 2. Something has been paid: `partial`.
/// 3. Any record awaiting verification: `pending_verification`; else any pending record: `pending`; else if every
///    record failed: `failed`.
/// 4. Otherwise the default for the payment method.
///
/// `paid` is only ever returned when the arithmetic balance is zero, regardless of what the individual records say.
pub fn derive_payment_status(
    method: PaymentMethod,
    total: Money,
    amount_paid: Money,
    record_statuses: &[PaymentStatus],
) -> PaymentStatus {
    let balance = compute_balance_due(total, amount_paid);
    if balance.is_zero() && total.is_positive() {
        return PaymentStatus::Paid;
    }
    if amount_paid.is_positive() {
        return PaymentStatus::Partial;
    }
    if record_statuses.contains(&PaymentStatus::PendingVerification) {
        return PaymentStatus::PendingVerification;
    }
    if record_statuses.contains(&PaymentStatus::Pending) {
        return PaymentStatus::Pending;
    }
    if !record_statuses.is_empty() && record_statuses.iter().all(|s| *s == PaymentStatus::Failed) {
        return PaymentStatus::Failed;
    }
    match method {
        PaymentMethod::CashOnDelivery => PaymentStatus::Unpaid,
        PaymentMethod::BankDeposit => PaymentStatus::PendingVerification,
        PaymentMethod::Gateway => PaymentStatus::Pending,
    }
}
