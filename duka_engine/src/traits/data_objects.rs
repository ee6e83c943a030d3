use std::fmt::Display;

use chrono::{DateTime, Utc};
use duka_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, OrderStatusType};

/// Criteria for [`crate::traits::OrderStore::search_orders`]. Empty criteria match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    /// Matched against the normalized phone number
    pub phone: Option<String>,
    pub statuses: Option<Vec<OrderStatusType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.phone.is_none()
            && self.statuses.as_ref().map_or(true, Vec::is_empty)
            && self.since.is_none()
            && self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "All orders");
        }
        if let Some(id) = &self.order_id {
            write!(f, "order_id: {id}. ")?;
        }
        if let Some(phone) = &self.phone {
            write!(f, "phone: {phone}. ")?;
        }
        if let Some(statuses) = &self.statuses {
            let s = statuses.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
            write!(f, "statuses: [{s}]. ")?;
        }
        if let Some(since) = self.since {
            write!(f, "since: {since}. ")?;
        }
        if let Some(until) = self.until {
            write!(f, "until: {until}. ")?;
        }
        Ok(())
    }
}

/// The administrative fields of an order that may be modified after creation. Finance fields are not in here: they
/// are only written by payment sync.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatusType>,
    pub shipping_adjustment: Option<Money>,
    pub total: Option<Money>,
}

impl OrderUpdate {
    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_shipping_adjustment(mut self, adjustment: Money, new_total: Money) -> Self {
        self.shipping_adjustment = Some(adjustment);
        self.total = Some(new_total);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.shipping_adjustment.is_none() && self.total.is_none()
    }
}
