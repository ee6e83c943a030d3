use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use duka_common::Money;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Implements `Display` and `FromStr` for a unit-only enum, using the same snake_case labels that serde uses on the
/// wire and that the database stores.
macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $label),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($label => Ok(Self::$variant),)+
                    other => Err(ConversionError(format!("{other} is not a valid {}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
/// How the customer chose to pay for an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Pay the courier in cash on delivery.
    #[default]
    CashOnDelivery,
    /// Pay online through the hosted payment gateway.
    Gateway,
    /// Deposit into the shop's bank account. Needs manual verification.
    BankDeposit,
}

labelled_enum!(PaymentMethod {
    CashOnDelivery => "cash_on_delivery",
    Gateway => "gateway",
    BankDeposit => "bank_deposit",
});

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment method: {value}. But this conversion cannot fail. Defaulting to cash_on_delivery");
            PaymentMethod::CashOnDelivery
        })
    }
}

//--------------------------------------  PaymentRecordMethod  ---------------------------------------------------------
/// The channel through which an individual payment record was made. `Manual` records are created by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentRecordMethod {
    CashOnDelivery,
    Gateway,
    BankDeposit,
    Manual,
}

labelled_enum!(PaymentRecordMethod {
    CashOnDelivery => "cash_on_delivery",
    Gateway => "gateway",
    BankDeposit => "bank_deposit",
    Manual => "manual",
});

impl From<PaymentMethod> for PaymentRecordMethod {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::CashOnDelivery => Self::CashOnDelivery,
            PaymentMethod::Gateway => Self::Gateway,
            PaymentMethod::BankDeposit => Self::BankDeposit,
        }
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
/// Payment state, used both for individual payment records and (derived) for whole orders.
///
/// `Partial` only ever appears on orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Partial,
    Paid,
    Failed,
    PendingVerification,
}

labelled_enum!(PaymentStatus {
    Unpaid => "unpaid",
    Pending => "pending",
    Partial => "partial",
    Paid => "paid",
    Failed => "failed",
    PendingVerification => "pending_verification",
});

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The fulfilment state of an order. Independent of the payment status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been placed, but the shop has not yet confirmed it.
    #[default]
    Pending,
    /// The shop has confirmed the order and is preparing it for delivery.
    Confirmed,
    /// The order has been handed over to the customer.
    Delivered,
    /// The order has been cancelled by the customer or an admin.
    Cancelled,
}

labelled_enum!(OrderStatusType {
    Pending => "pending",
    Confirmed => "confirmed",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    OrderLineItem      ---------------------------------------------------------
/// One product line within an order. Line items only exist embedded in their order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    /// The number of units the customer pays for
    pub paid_quantity: u32,
    /// Units given away by a promotion
    #[serde(default)]
    pub free_quantity: u32,
    pub unit_price: Money,
    pub original_unit_price: Money,
    pub subtotal: Money,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    /// The phone number as the customer typed it. Used for display only.
    pub phone: String,
    /// Digits-only form of `phone`. Used for all lookups.
    pub phone_normalized: String,
    pub region: String,
    pub address: String,
    pub order_items: Vec<OrderLineItem>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub shipping_adjustment: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    /// Derived from the order's payment records. Never edited directly.
    pub amount_paid: Money,
    /// Denormalized cache of `total - amount_paid`.
    pub balance_due: Money,
    /// Derived from the order's payment records. Never edited directly.
    pub payment_status: PaymentStatus,
    pub status: OrderStatusType,
    pub installment_enabled: bool,
    pub deposit_amount: Option<Money>,
    pub installment_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_payment_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Overwrites the cached finance fields with a freshly computed summary.
    pub fn with_summary(mut self, summary: &OrderPaymentSummary) -> Self {
        self.amount_paid = summary.amount_paid;
        self.balance_due = summary.balance_due;
        self.payment_status = summary.payment_status;
        self.total = summary.total;
        self
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// A fully priced order, ready to be stored. Prices have already been resolved against the product catalog.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub customer_name: String,
    pub phone: String,
    pub phone_normalized: String,
    pub region: String,
    pub address: String,
    pub order_items: Vec<OrderLineItem>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub shipping_adjustment: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    /// The initial derived payment status (no payment records exist yet)
    pub payment_status: PaymentStatus,
    pub installment_enabled: bool,
    pub deposit_amount: Option<Money>,
    pub installment_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     OrderPayment      ---------------------------------------------------------
/// One attempt or confirmation of payment against an order.
///
/// Records are immutable once created, except for `status` and `paid_at`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayment {
    pub id: String,
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentRecordMethod,
    pub status: PaymentStatus,
    /// Free-text reference. For gateway payments this is the merchant reference sent to the gateway.
    pub reference: Option<String>,
    /// The gateway's tracking id, for gateway payments
    pub tracking_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewOrderPayment {
    pub id: String,
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentRecordMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub tracking_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl NewOrderPayment {
    pub fn new(id: String, order_id: OrderId, amount: Money, method: PaymentRecordMethod, status: PaymentStatus) -> Self {
        let now = Utc::now();
        let paid_at = (status == PaymentStatus::Paid).then_some(now);
        Self {
            id,
            order_id,
            amount,
            method,
            status,
            reference: None,
            tracking_id: None,
            notes: None,
            created_at: now,
            paid_at,
        }
    }

    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_tracking_id<S: Into<String>>(mut self, tracking_id: S) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }
}

//--------------------------------------  OrderPaymentSummary  ---------------------------------------------------------
/// The recomputed finance state of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaymentSummary {
    pub order_id: OrderId,
    pub amount_paid: Money,
    pub total: Money,
    pub balance_due: Money,
    pub payment_status: PaymentStatus,
}

/// The fields written back onto an order after its payment records have been reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSummaryUpdate {
    pub amount_paid: Money,
    pub balance_due: Money,
    pub payment_status: PaymentStatus,
    pub last_payment_at: Option<DateTime<Utc>>,
}

//--------------------------------------     ProductReview     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReview {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub customer_name: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProductReview {
    pub order_id: OrderId,
    pub product_id: String,
    pub customer_name: String,
    pub rating: u8,
    pub comment: Option<String>,
}
