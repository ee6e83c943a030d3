use std::fmt::Display;

use duka_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway is not configured")]
    NotConfigured,
    #[error("Could not reach the payment gateway: {0}")]
    Request(String),
    #[error("The payment gateway rejected the request: {message}")]
    Rejected { message: String },
    #[error("The payment gateway sent a response we could not understand: {0}")]
    MalformedResponse(String),
    #[error("The payment gateway did not respond in time")]
    Timeout,
}

/// A request to create a payable order on the hosted gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrderRequest {
    pub order_id: OrderId,
    /// Our reference for this payment attempt. This is the payment record id.
    pub merchant_reference: String,
    pub amount: Money,
    pub description: String,
    pub callback_url: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
}

/// The gateway's answer to [`GatewayOrderRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Where to send the customer's browser to complete the payment
    pub redirect_url: String,
    pub tracking_id: String,
    pub merchant_reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewaySettlement {
    Completed,
    Failed,
    /// The gateway has no completed attempt yet, e.g. the customer has not finished checking out
    Invalid,
    Reversed,
    Pending,
}

impl Display for GatewaySettlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Invalid => write!(f, "invalid"),
            Self::Reversed => write!(f, "reversed"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransactionStatus {
    pub is_paid: bool,
    pub status: GatewaySettlement,
    pub amount: Option<Money>,
    pub merchant_reference: Option<String>,
    pub confirmation_code: Option<String>,
    pub description: Option<String>,
}

impl GatewayTransactionStatus {
    pub fn pending() -> Self {
        Self {
            is_paid: false,
            status: GatewaySettlement::Pending,
            amount: None,
            merchant_reference: None,
            confirmation_code: None,
            description: None,
        }
    }
}

/// The narrow contract of an external hosted payment gateway.
///
/// Implementations are responsible for their own authentication and for bounding each call with a timeout. Any
/// failure must leave local state untouched; the engine only writes after a successful call.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Creates a payable order on the gateway and returns the redirect URL for the customer.
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;

    /// Queries the settlement status of a previously created gateway order.
    async fn transaction_status(&self, tracking_id: &str) -> Result<GatewayTransactionStatus, GatewayError>;
}
