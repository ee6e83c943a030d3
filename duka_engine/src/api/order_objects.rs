use duka_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderPayment, OrderPaymentSummary, OrderStatusType, PaymentMethod, PaymentStatus},
    traits::GatewayOrder,
};

/// One line of the customer's cart, as submitted at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub customer_name: String,
    pub phone: String,
    pub region: String,
    pub address: String,
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub installment_enabled: bool,
    #[serde(default)]
    pub deposit_amount: Option<Money>,
    #[serde(default)]
    pub installment_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum NewOrderOutcome {
    /// The order was stored. No further action is needed from the customer right now.
    #[serde(rename_all = "camelCase")]
    Created { id: OrderId, status: OrderStatusType, payment_status: PaymentStatus, total: Money },
    /// The order was stored and the customer must complete payment on the gateway.
    #[serde(rename_all = "camelCase")]
    PaymentRequired { id: OrderId, redirect_url: String, tracking_id: String },
}

impl NewOrderOutcome {
    pub fn order_id(&self) -> &OrderId {
        match self {
            Self::Created { id, .. } | Self::PaymentRequired { id, .. } => id,
        }
    }
}

/// An installment or balance payment against an existing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancePaymentRequest {
    /// Must match the order's phone number after normalization
    pub phone: String,
    pub amount: Money,
    pub method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BalancePaymentOutcome {
    /// A pending gateway payment was recorded. The customer must be sent to `redirect_url`.
    #[serde(rename_all = "camelCase")]
    PaymentRequired { order_id: OrderId, payment_id: String, redirect_url: String, tracking_id: String },
    /// The payment was recorded and awaits confirmation.
    Recorded { payment: OrderPayment, summary: OrderPaymentSummary },
}

impl BalancePaymentOutcome {
    pub fn payment_required(order_id: OrderId, payment: &OrderPayment, gateway: GatewayOrder) -> Self {
        Self::PaymentRequired {
            order_id,
            payment_id: payment.id.clone(),
            redirect_url: gateway.redirect_url,
            tracking_id: gateway.tracking_id,
        }
    }
}

/// An administrative change to an order. All fields are optional, but at least one must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyOrderRequest {
    #[serde(default)]
    pub status: Option<OrderStatusType>,
    /// Only `paid` is accepted. It records a manual payment for the outstanding balance.
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub shipping_adjustment: Option<Money>,
}

impl ModifyOrderRequest {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.payment_status.is_none() && self.shipping_adjustment.is_none()
    }
}

/// An order with its payment history, newest payment first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithPayments {
    #[serde(flatten)]
    pub order: Order,
    pub payments: Vec<OrderPayment>,
}

/// A return or webhook delivery from the payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayNotification {
    pub tracking_id: String,
    #[serde(default)]
    pub merchant_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutcome {
    pub payment: OrderPayment,
    pub summary: OrderPaymentSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub phone: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
    /// Which product in the order is being reviewed. Defaults to the first line item.
    #[serde(default)]
    pub product_id: Option<String>,
}
