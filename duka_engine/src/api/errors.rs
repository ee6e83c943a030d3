use duka_common::Money;
use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{GatewayError, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Order {0} has already been paid in full")]
    AlreadyPaid(OrderId),
    #[error("The amount {amount} exceeds the outstanding balance of {balance}")]
    ExceedsBalance { amount: Money, balance: Money },
    #[error("Installment payments are not available yet. The payments table has not been created.")]
    PaymentsNotMigrated,
    #[error("Cannot change {what} from {from} to {to}")]
    IllegalStatusChange { what: &'static str, from: String, to: String },
    #[error("The requested change would not modify anything")]
    NoOp,
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    Store(StoreError),
}

impl From<StoreError> for OrderFlowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::PaymentNotFound(id) => Self::PaymentNotFound(id),
            other => Self::Store(other),
        }
    }
}

impl OrderFlowError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Maps a failed payment insert onto [`OrderFlowError::PaymentsNotMigrated`] when the payments relation is
    /// missing.
    pub(crate) fn from_payment_insert(e: StoreError) -> Self {
        match e {
            StoreError::RelationMissing(_) => Self::PaymentsNotMigrated,
            other => other.into(),
        }
    }
}
