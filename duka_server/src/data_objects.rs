use chrono::{DateTime, Utc};
use duka_engine::{
    db_types::{OrderId, OrderStatusType, PaymentStatus},
    helpers::normalize_phone,
    order_objects::OrderWithPayments,
    traits::OrderQueryFilter,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// Query string of `GET /account/orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOrdersParams {
    pub phone: String,
    #[serde(default, alias = "order_id", alias = "orderId")]
    pub order: Option<String>,
}

impl AccountOrdersParams {
    pub fn order_id(&self) -> Option<OrderId> {
        self.order.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(OrderId::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOrdersResponse {
    pub orders: Vec<OrderWithPayments>,
}

/// What the payment gateway sends on the browser callback and on IPN deliveries, either as a query string or as a
/// JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRedirectParams {
    #[serde(rename = "OrderTrackingId", alias = "orderTrackingId")]
    pub order_tracking_id: String,
    #[serde(default, rename = "OrderMerchantReference", alias = "orderMerchantReference")]
    pub order_merchant_reference: Option<String>,
    #[serde(default, rename = "OrderNotificationType", alias = "orderNotificationType")]
    pub order_notification_type: Option<String>,
}

impl GatewayRedirectParams {
    pub fn notification_type(&self) -> &str {
        self.order_notification_type.as_deref().unwrap_or("IPNCHANGE")
    }

    pub fn merchant_reference(&self) -> &str {
        self.order_merchant_reference.as_deref().unwrap_or_default()
    }
}

/// Returned from the gateway callback when no storefront URL is configured to redirect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCallbackResult {
    pub order_id: OrderId,
    pub payment_id: String,
    pub payment_status: PaymentStatus,
    pub order_payment_status: PaymentStatus,
}

/// Query string of `GET /admin/orders`.
///
/// `status` is a comma-separated list of fulfilment statuses, e.g. `pending,confirmed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminOrderSearchParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "paymentStatus")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

impl AdminOrderSearchParams {
    pub fn to_filter(&self) -> Result<OrderQueryFilter, ServerError> {
        let mut filter = OrderQueryFilter::default();
        if let Some(statuses) = &self.status {
            for s in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status =
                    s.parse::<OrderStatusType>().map_err(|e| ServerError::ValidationError(e.to_string()))?;
                filter = filter.with_status(status);
            }
        }
        if let Some(phone) = self.phone.as_deref().map(normalize_phone).filter(|p| !p.is_empty()) {
            filter = filter.with_phone(phone);
        }
        if let Some(since) = self.since {
            filter = filter.with_since(since);
        }
        if let Some(until) = self.until {
            filter = filter.with_until(until);
        }
        Ok(filter)
    }
}
