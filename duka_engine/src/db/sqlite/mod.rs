//! # SQLite backend
//!
//! [`SqliteDatabase`] is the persistent implementation of [`OrderStore`].
//!
//! The submodules hold the "low-level" queries as simple functions that accept a `&mut SqliteConnection`. Callers can
//! obtain a connection from the pool, or open a transaction and pass `&mut *tx` without any other changes.
mod errors;

pub mod orders;
pub mod payments;
pub mod reviews;

use std::{fmt::Debug, str::FromStr};

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

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
    traits::{OrderQueryFilter, OrderStore, OrderUpdate, StoreError},
};

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database at `url`, creating the database file if it does not exist yet.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        info!("🗃️ Connected to SQLite database at {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl OrderStore for SqliteDatabase {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }

    async fn update_order(&self, order_id: &OrderId, update: OrderUpdate) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order(order_id, update, &mut conn).await
    }

    async fn update_payment_summary(&self, order_id: &OrderId, summary: PaymentSummaryUpdate) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_payment_summary(order_id, summary, &mut conn).await
    }

    async fn insert_payment(&self, payment: NewOrderPayment) -> Result<OrderPayment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(payment, &mut conn).await
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderPayment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_order(order_id, &mut conn).await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<OrderPayment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn fetch_payment_by_tracking_id(&self, tracking_id: &str) -> Result<Option<OrderPayment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_tracking_id(tracking_id, &mut conn).await
    }

    async fn update_payment_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<OrderPayment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::update_payment_status(payment_id, status, paid_at, &mut conn).await
    }

    async fn insert_review(&self, review: NewProductReview) -> Result<ProductReview, StoreError> {
        let mut tx = self.pool.begin().await?;
        let review = reviews::insert_review(review, &mut tx).await?;
        tx.commit().await?;
        Ok(review)
    }

    async fn fetch_review_for_order(&self, order_id: &OrderId) -> Result<Option<ProductReview>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reviews::fetch_review_for_order(order_id, &mut conn).await
    }

    async fn fetch_reviews_for_product(&self, product_id: &str) -> Result<Vec<ProductReview>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reviews::fetch_reviews_for_product(product_id, &mut conn).await
    }
}
