//! Payment records. The `order_payments` relation arrived after the orders table, so any of these calls may fail with
//! [`StoreError::RelationMissing`] on an older store.
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrderPayment, OrderId, OrderPayment, PaymentStatus},
    traits::StoreError,
};

pub async fn insert_payment(payment: NewOrderPayment, conn: &mut SqliteConnection) -> Result<OrderPayment, StoreError> {
    let record: OrderPayment = sqlx::query_as(
        r#"
            INSERT INTO order_payments (
                id,
                order_id,
                amount,
                method,
                status,
                reference,
                tracking_id,
                notes,
                created_at,
                paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(payment.id)
    .bind(payment.order_id)
    .bind(payment.amount)
    .bind(payment.method)
    .bind(payment.status)
    .bind(payment.reference)
    .bind(payment.tracking_id)
    .bind(payment.notes)
    .bind(payment.created_at)
    .bind(payment.paid_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payment {} of {} recorded against order {} as {}", record.id, record.amount, record.order_id, record.status);
    Ok(record)
}

pub async fn fetch_payments_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderPayment>, StoreError> {
    let payments = sqlx::query_as("SELECT * FROM order_payments WHERE order_id = $1 ORDER BY created_at ASC, rowid ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

pub async fn fetch_payment(payment_id: &str, conn: &mut SqliteConnection) -> Result<Option<OrderPayment>, StoreError> {
    let payment =
        sqlx::query_as("SELECT * FROM order_payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_tracking_id(
    tracking_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderPayment>, StoreError> {
    let payment = sqlx::query_as("SELECT * FROM order_payments WHERE tracking_id = $1 ORDER BY created_at DESC LIMIT 1")
        .bind(tracking_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn update_payment_status(
    payment_id: &str,
    status: PaymentStatus,
    paid_at: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<OrderPayment, StoreError> {
    let payment: Option<OrderPayment> =
        sqlx::query_as("UPDATE order_payments SET status = $1, paid_at = COALESCE($2, paid_at) WHERE id = $3 RETURNING *")
            .bind(status)
            .bind(paid_at)
            .bind(payment_id)
            .fetch_optional(conn)
            .await?;
    payment.ok_or_else(|| StoreError::PaymentNotFound(payment_id.to_string()))
}
