use std::fmt::Debug;

use log::*;

use crate::{
    api::{errors::OrderFlowError, order_objects::OrderWithPayments, payment_flow_api::PaymentFlowApi},
    db_types::{Order, OrderId},
    helpers::{valid_phone, MIN_PHONE_DIGITS},
    traits::{OrderQueryFilter, OrderStore, PaymentGateway, StoreError},
};

/// `AccountApi` answers "show me my orders" lookups. Customers have no accounts; the normalized phone number is the
/// lookup key.
pub struct AccountApi<B, G> {
    payments: PaymentFlowApi<B, G>,
}

impl<B: Clone, G> Clone for AccountApi<B, G> {
    fn clone(&self) -> Self {
        Self { payments: self.payments.clone() }
    }
}

impl<B, G> Debug for AccountApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi")
    }
}

impl<B, G> AccountApi<B, G> {
    pub fn new(payments: PaymentFlowApi<B, G>) -> Self {
        Self { payments }
    }
}

impl<B, G> AccountApi<B, G>
where
    B: OrderStore,
    G: PaymentGateway,
{
    /// Returns the orders placed with `phone`, newest first, each with its payment history (newest payment first).
    ///
    /// If `order_id` is given, only that order is returned. An order that exists but belongs to a different phone
    /// number is reported as forbidden.
    ///
    /// Before an order is returned, its pending gateway payments are checked with the gateway and the order is
    /// synced.
    pub async fn orders_for_phone(
        &self,
        phone: &str,
        order_id: Option<&OrderId>,
    ) -> Result<Vec<OrderWithPayments>, OrderFlowError> {
        let phone = valid_phone(phone).ok_or_else(|| {
            OrderFlowError::Validation(format!("The phone number must contain at least {MIN_PHONE_DIGITS} digits"))
        })?;
        let orders = match order_id {
            Some(id) => vec![self.order_for_phone(&phone, id).await?],
            None => self.search_by_phone(&phone).await?,
        };
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            result.push(self.with_payments(order).await?);
        }
        debug!("🔄️📦️ {} orders found for phone lookup", result.len());
        Ok(result)
    }

    async fn order_for_phone(&self, phone: &str, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self
            .payments
            .db()
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if order.phone_normalized != phone {
            return Err(OrderFlowError::Forbidden("This order does not belong to that phone number".into()));
        }
        Ok(order)
    }

    async fn search_by_phone(&self, phone: &str) -> Result<Vec<Order>, OrderFlowError> {
        let db = self.payments.db();
        match db.search_orders(OrderQueryFilter::default().with_phone(phone)).await {
            Ok(orders) => Ok(orders),
            Err(StoreError::SchemaMismatch { missing }) => {
                warn!("🔄️📦️ The store is missing {missing}. Filtering orders by phone in memory instead.");
                let orders = db.search_orders(OrderQueryFilter::default()).await?;
                Ok(orders.into_iter().filter(|o| o.phone_normalized == phone).collect())
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn with_payments(&self, order: Order) -> Result<OrderWithPayments, OrderFlowError> {
        let updated = self.payments.reconcile_pending_gateway_payments(&order.id).await?;
        if updated > 0 {
            debug!("🔄️💳️ {updated} gateway payments for order {} were settled on lookup", order.id);
        }
        let order = match self.payments.refresh_order_payment_summary(&order.id).await? {
            Some(summary) => order.with_summary(&summary),
            None => order,
        };
        let mut payments = match self.payments.db().fetch_payments_for_order(&order.id).await {
            Ok(payments) => payments,
            Err(StoreError::RelationMissing(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        payments.reverse();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(OrderWithPayments { order, payments })
    }
}
