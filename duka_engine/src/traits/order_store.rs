use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        NewOrder,
        NewOrderPayment,
        NewProductReview,
        Order,
        OrderId,
        OrderPayment,
        PaymentStatus,
        PaymentSummaryUpdate,
        ProductReview,
    },
    traits::{OrderQueryFilter, OrderUpdate},
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// The backing store is running an older schema that lacks a column the write needs.
    #[error("The store schema is missing {missing}")]
    SchemaMismatch { missing: String },
    /// An optional relation (e.g. the payments table) has not been created in the backing store.
    #[error("The relation {0} does not exist in the store")]
    RelationMissing(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Order {0} already exists")]
    OrderAlreadyExists(OrderId),
    #[error("Order {0} has already been reviewed")]
    ReviewAlreadyExists(OrderId),
}

impl StoreError {
    pub fn is_schema_drift(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. } | Self::RelationMissing(_))
    }
}

/// The storage contract for orders, their payment records and product reviews.
///
/// Two implementations exist: `SqliteDatabase` (persistent) and `MemoryStore` (process-local, non-durable). Exactly
/// one is selected at startup.
///
/// Persistent backends must tolerate schema drift on writes: if a write fails because a column does not exist, retry
/// once with the legacy column set before giving up. Reads that assemble an [`Order`] must reconstruct its line items
/// from whatever representation the row holds.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// A short human-readable name for the backend, used in logs
    fn backend_name(&self) -> &'static str;

    /// Stores a new order. Fails with [`StoreError::OrderAlreadyExists`] if the id is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Returns the orders matching the filter, newest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError>;

    /// Applies an administrative update. Returns the updated order, or `None` if it does not exist.
    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Option<Order>, StoreError>;

    /// Writes the recomputed finance fields onto the order.
    ///
    /// Payment sync is the only caller of this method.
    async fn update_payment_summary(&self, order_id: &OrderId, summary: PaymentSummaryUpdate) -> Result<(), StoreError>;

    /// Appends a new payment record. Fails with [`StoreError::RelationMissing`] if the payments relation does not
    /// exist yet.
    async fn insert_payment(&self, payment: NewOrderPayment) -> Result<OrderPayment, StoreError>;

    /// All payment records for the order, in insertion order.
    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderPayment>, StoreError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<OrderPayment>, StoreError>;

    async fn fetch_payment_by_tracking_id(&self, tracking_id: &str) -> Result<Option<OrderPayment>, StoreError>;

    /// Moves a payment record to a new status. This, together with `paid_at`, is the only mutation a payment record
    /// ever undergoes.
    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<OrderPayment, StoreError>;

    /// Fails with [`StoreError::ReviewAlreadyExists`] if the order has already been reviewed.
    async fn insert_review(&self, review: NewProductReview) -> Result<ProductReview, StoreError>;

    async fn fetch_review_for_order(&self, order_id: &OrderId) -> Result<Option<ProductReview>, StoreError>;

    /// Reviews for the product, newest first.
    async fn fetch_reviews_for_product(&self, product_id: &str) -> Result<Vec<ProductReview>, StoreError>;
}
