//! # In-memory backend
//!
//! [`MemoryStore`] keeps every order, payment record and review in process memory. It is selected when no database
//! is configured and is reset whenever the process restarts. Each instance is independent, so tests can construct
//! their own without sharing state.
use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use tokio::sync::RwLock;

use crate::{
    db_types::{
        NewOrder,
        NewOrderPayment,
        NewProductReview,
        Order,
        OrderId,
        OrderPayment,
        OrderStatusType,
        PaymentStatus,
        PaymentSummaryUpdate,
        ProductReview,
    },
    traits::{OrderQueryFilter, OrderStore, OrderUpdate, StoreError},
};

#[derive(Debug, Default)]
struct MemoryState {
    orders: HashMap<OrderId, Order>,
    /// Payment records per order, in insertion order
    payments: HashMap<OrderId, Vec<OrderPayment>>,
    reviews: Vec<ProductReview>,
}

impl MemoryState {
    fn payment_mut(&mut self, payment_id: &str) -> Option<&mut OrderPayment> {
        self.payments.values_mut().flat_map(|v| v.iter_mut()).find(|p| p.id == payment_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(order: &Order, query: &OrderQueryFilter) -> bool {
    query.order_id.as_ref().map_or(true, |id| &order.id == id)
        && query.phone.as_ref().map_or(true, |p| &order.phone_normalized == p)
        && query.statuses.as_ref().map_or(true, |s| s.is_empty() || s.contains(&order.status))
        && query.since.map_or(true, |t| order.created_at >= t)
        && query.until.map_or(true, |t| order.created_at <= t)
}

impl OrderStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::OrderAlreadyExists(order.id));
        }
        let order = Order {
            id: order.id,
            customer_name: order.customer_name,
            phone: order.phone,
            phone_normalized: order.phone_normalized,
            region: order.region,
            address: order.address,
            order_items: order.order_items,
            subtotal: order.subtotal,
            shipping_fee: order.shipping_fee,
            shipping_adjustment: order.shipping_adjustment,
            total: order.total,
            payment_method: order.payment_method,
            amount_paid: Default::default(),
            balance_due: order.total,
            payment_status: order.payment_status,
            status: OrderStatusType::Pending,
            installment_enabled: order.installment_enabled,
            deposit_amount: order.deposit_amount,
            installment_notes: order.installment_notes,
            created_at: order.created_at,
            updated_at: order.created_at,
            last_payment_at: None,
        };
        state.orders.insert(order.id.clone(), order.clone());
        debug!("🗃️ Order [{}] inserted into the memory store", order.id);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.orders.get(order_id).cloned())
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError> {
        let state = self.state.read().await;
        let mut orders = state.orders.values().filter(|o| matches_filter(o, &query)).cloned().collect::<Vec<_>>();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.as_str().cmp(a.id.as_str())));
        Ok(orders)
    }

    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Option<Order>, StoreError> {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(order_id) else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(order.clone()));
        }
        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(adjustment) = update.shipping_adjustment {
            order.shipping_adjustment = adjustment;
        }
        if let Some(total) = update.total {
            order.total = total;
            order.balance_due = total.saturating_sub(order.amount_paid);
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn update_payment_summary(&self, order_id: &OrderId, summary: PaymentSummaryUpdate) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let order = state.orders.get_mut(order_id).ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        order.amount_paid = summary.amount_paid;
        order.balance_due = summary.balance_due;
        order.payment_status = summary.payment_status;
        order.last_payment_at = summary.last_payment_at;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_payment(&self, payment: NewOrderPayment) -> Result<OrderPayment, StoreError> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&payment.order_id) {
            return Err(StoreError::OrderNotFound(payment.order_id));
        }
        let record = OrderPayment {
            id: payment.id,
            order_id: payment.order_id,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            reference: payment.reference,
            tracking_id: payment.tracking_id,
            notes: payment.notes,
            created_at: payment.created_at,
            paid_at: payment.paid_at,
        };
        state.payments.entry(record.order_id.clone()).or_default().push(record.clone());
        debug!("🗃️ Payment {} of {} recorded against order {}", record.id, record.amount, record.order_id);
        Ok(record)
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderPayment>, StoreError> {
        Ok(self.state.read().await.payments.get(order_id).cloned().unwrap_or_default())
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<OrderPayment>, StoreError> {
        let state = self.state.read().await;
        Ok(state.payments.values().flatten().find(|p| p.id == payment_id).cloned())
    }

    async fn fetch_payment_by_tracking_id(&self, tracking_id: &str) -> Result<Option<OrderPayment>, StoreError> {
        let state = self.state.read().await;
        let payment = state
            .payments
            .values()
            .flatten()
            .filter(|p| p.tracking_id.as_deref() == Some(tracking_id))
            .max_by_key(|p| p.created_at)
            .cloned();
        Ok(payment)
    }

    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<OrderPayment, StoreError> {
        let mut state = self.state.write().await;
        let payment = state.payment_mut(payment_id).ok_or_else(|| StoreError::PaymentNotFound(payment_id.into()))?;
        payment.status = status;
        if paid_at.is_some() {
            payment.paid_at = paid_at;
        }
        Ok(payment.clone())
    }

    async fn insert_review(&self, review: NewProductReview) -> Result<ProductReview, StoreError> {
        let mut state = self.state.write().await;
        if state.reviews.iter().any(|r| r.order_id == review.order_id) {
            return Err(StoreError::ReviewAlreadyExists(review.order_id));
        }
        let id = i64::try_from(state.reviews.len()).unwrap_or(i64::MAX - 1) + 1;
        let review = ProductReview {
            id,
            order_id: review.order_id,
            product_id: review.product_id,
            customer_name: review.customer_name,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };
        state.reviews.push(review.clone());
        Ok(review)
    }

    async fn fetch_review_for_order(&self, order_id: &OrderId) -> Result<Option<ProductReview>, StoreError> {
        let state = self.state.read().await;
        Ok(state.reviews.iter().find(|r| &r.order_id == order_id).cloned())
    }

    async fn fetch_reviews_for_product(&self, product_id: &str) -> Result<Vec<ProductReview>, StoreError> {
        let state = self.state.read().await;
        let mut reviews = state.reviews.iter().filter(|r| r.product_id == product_id).cloned().collect::<Vec<_>>();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(reviews)
    }
}
