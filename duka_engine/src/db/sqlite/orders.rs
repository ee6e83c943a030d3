//! Order rows.
//!
//! Rows are decoded by hand rather than with `FromRow`, so that orders written under an older schema (no line-item
//! or finance columns) still load.
use chrono::{DateTime, Utc};
use duka_common::Money;
use log::*;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, SqliteConnection};

use crate::{
    db::{
        common::{legacy_columns_for, reconstruct_line_items, LegacyLineColumns},
        sqlite::errors::duplicate_key,
    },
    db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentMethod, PaymentStatus, PaymentSummaryUpdate},
    helpers::{compute_balance_due, normalize_phone},
    traits::{OrderQueryFilter, OrderUpdate, StoreError},
};

/// Reads a column that may not exist in older schemas.
fn optional<'r, T>(row: &'r SqliteRow, column: &str) -> Option<T>
where T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite> {
    row.try_get::<Option<T>, _>(column).ok().flatten()
}

pub(crate) fn order_from_row(row: &SqliteRow) -> Result<Order, sqlx::Error> {
    let id: OrderId = row.try_get("id")?;
    let phone: String = row.try_get("phone")?;
    let subtotal: Money = row.try_get("subtotal")?;
    let total: Money = row.try_get("total")?;
    let amount_paid = optional::<Money>(row, "amount_paid").unwrap_or_default();
    let raw_items = optional::<String>(row, "order_items");
    let legacy = LegacyLineColumns {
        product_id: optional(row, "product_id"),
        product_name: optional(row, "product_name"),
        quantity: optional(row, "quantity"),
        subtotal,
    };
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let order = Order {
        phone_normalized: optional::<String>(row, "phone_normalized").unwrap_or_else(|| normalize_phone(&phone)),
        phone,
        customer_name: row.try_get("customer_name")?,
        region: row.try_get("region")?,
        address: row.try_get("address")?,
        order_items: reconstruct_line_items(raw_items.as_deref(), legacy),
        subtotal,
        shipping_fee: optional(row, "shipping_fee").unwrap_or_default(),
        shipping_adjustment: optional(row, "shipping_adjustment").unwrap_or_default(),
        total,
        payment_method: PaymentMethod::from(row.try_get::<String, _>("payment_method")?),
        amount_paid,
        balance_due: compute_balance_due(total, amount_paid),
        payment_status: PaymentStatus::from(row.try_get::<String, _>("payment_status")?),
        status: OrderStatusType::from(row.try_get::<String, _>("status")?),
        installment_enabled: optional(row, "installment_enabled").unwrap_or(false),
        deposit_amount: optional(row, "deposit_amount"),
        installment_notes: optional(row, "installment_notes"),
        updated_at: optional(row, "updated_at").unwrap_or(created_at),
        created_at,
        last_payment_at: optional(row, "last_payment_at"),
        id,
    };
    Ok(order)
}

/// Inserts a new order. If the store runs an older schema, the insert is retried once with the legacy column set,
/// dropping the newer fields. A taken id is reported as [`StoreError::OrderAlreadyExists`].
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let result = match insert_full(&order, conn).await {
        Err(StoreError::SchemaMismatch { missing }) => {
            warn!("🗃️ Orders table is missing {missing}. Retrying insert of {} with the legacy columns.", order.id);
            insert_legacy(&order, conn).await
        },
        result => result,
    };
    match result {
        Err(e) if duplicate_key(&e) == Some("orders.id") => return Err(StoreError::OrderAlreadyExists(order.id)),
        result => result?,
    }
    debug!("🗃️ Order [{}] inserted", order.id);
    fetch_order(&order.id, conn).await?.ok_or(StoreError::OrderNotFound(order.id))
}

async fn insert_full(order: &NewOrder, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let items = serde_json::to_string(&order.order_items).map_err(|e| StoreError::DatabaseError(e.to_string()))?;
    let legacy = legacy_columns_for(&order.order_items, order.subtotal);
    sqlx::query(
        r#"
            INSERT INTO orders (
                id,
                customer_name,
                phone,
                phone_normalized,
                region,
                address,
                product_id,
                product_name,
                quantity,
                order_items,
                subtotal,
                shipping_fee,
                shipping_adjustment,
                total,
                payment_method,
                amount_paid,
                balance_due,
                payment_status,
                status,
                installment_enabled,
                deposit_amount,
                installment_notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21,
              $22, $23, $24);
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_name)
    .bind(&order.phone)
    .bind(&order.phone_normalized)
    .bind(&order.region)
    .bind(&order.address)
    .bind(legacy.product_id)
    .bind(legacy.product_name)
    .bind(legacy.quantity)
    .bind(items)
    .bind(order.subtotal)
    .bind(order.shipping_fee)
    .bind(order.shipping_adjustment)
    .bind(order.total)
    .bind(order.payment_method.to_string())
    .bind(Money::ZERO)
    .bind(order.total)
    .bind(order.payment_status.to_string())
    .bind(OrderStatusType::Pending.to_string())
    .bind(order.installment_enabled)
    .bind(order.deposit_amount)
    .bind(&order.installment_notes)
    .bind(order.created_at)
    .bind(order.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_legacy(order: &NewOrder, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let legacy = legacy_columns_for(&order.order_items, order.subtotal);
    sqlx::query(
        r#"
            INSERT INTO orders (
                id,
                customer_name,
                phone,
                region,
                address,
                product_id,
                product_name,
                quantity,
                subtotal,
                total,
                payment_method,
                payment_status,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15);
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_name)
    .bind(&order.phone)
    .bind(&order.region)
    .bind(&order.address)
    .bind(legacy.product_id)
    .bind(legacy.product_name)
    .bind(legacy.quantity)
    .bind(order.subtotal)
    .bind(order.total)
    .bind(order.payment_method.to_string())
    .bind(order.payment_status.to_string())
    .bind(OrderStatusType::Pending.to_string())
    .bind(order.created_at)
    .bind(order.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let row = sqlx::query("SELECT * FROM orders WHERE id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    let order = row.as_ref().map(order_from_row).transpose()?;
    Ok(order)
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`, newest first.
///
/// Filtering by phone needs the `phone_normalized` column. On an older schema this fails with
/// [`StoreError::SchemaMismatch`] and callers are expected to filter in memory instead.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("id = ");
        where_clause.push_bind_unseparated(order_id.to_string());
    }
    if let Some(phone) = query.phone {
        where_clause.push("phone_normalized = ");
        where_clause.push_bind_unseparated(phone);
    }
    if let Some(statuses) = query.statuses.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.to_string());
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build().fetch_all(conn).await?;
    let orders = rows.iter().map(order_from_row).collect::<Result<Vec<_>, _>>()?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

pub async fn update_order(
    id: &OrderId,
    update: OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StoreError> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for order {id}. Update request skipped.");
        return fetch_order(id, conn).await;
    }
    match apply_update(id, &update, true, conn).await {
        Err(StoreError::SchemaMismatch { missing }) if update.shipping_adjustment.is_some() => {
            warn!("🗃️ Orders table is missing {missing}. Updating order {id} without the shipping adjustment.");
            apply_update(id, &update, false, conn).await?;
        },
        result => result?,
    }
    fetch_order(id, conn).await
}

async fn apply_update(
    id: &OrderId,
    update: &OrderUpdate,
    with_adjustment: bool,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let mut builder = QueryBuilder::new("UPDATE orders SET ");
    let mut set_clause = builder.separated(", ");
    set_clause.push("updated_at = ");
    set_clause.push_bind_unseparated(Utc::now());
    if let Some(status) = update.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(adjustment) = update.shipping_adjustment.filter(|_| with_adjustment) {
        set_clause.push("shipping_adjustment = ");
        set_clause.push_bind_unseparated(adjustment);
    }
    if let Some(total) = update.total {
        set_clause.push("total = ");
        set_clause.push_bind_unseparated(total);
        if with_adjustment {
            // Keep the cached balance in step with the new total
            set_clause.push("balance_due = MAX(0, ");
            set_clause.push_bind_unseparated(total);
            set_clause.push_unseparated(" - amount_paid)");
        }
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id.as_str());
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build().execute(conn).await?;
    Ok(())
}

/// Writes the recomputed finance fields onto the order. On an older schema only `payment_status` is written.
pub async fn update_payment_summary(
    id: &OrderId,
    summary: PaymentSummaryUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                amount_paid = $1,
                balance_due = $2,
                payment_status = $3,
                last_payment_at = $4,
                updated_at = $5
            WHERE id = $6
        "#,
    )
    .bind(summary.amount_paid)
    .bind(summary.balance_due)
    .bind(summary.payment_status.to_string())
    .bind(summary.last_payment_at)
    .bind(now)
    .bind(id.as_str())
    .execute(&mut *conn)
    .await;
    let rows = match result.map_err(StoreError::from) {
        Ok(r) => r.rows_affected(),
        Err(StoreError::SchemaMismatch { missing }) => {
            warn!("🗃️ Orders table is missing {missing}. Only the payment status of {id} will be saved.");
            sqlx::query("UPDATE orders SET payment_status = $1, updated_at = $2 WHERE id = $3")
                .bind(summary.payment_status.to_string())
                .bind(now)
                .bind(id.as_str())
                .execute(&mut *conn)
                .await?
                .rows_affected()
        },
        Err(e) => return Err(e),
    };
    if rows == 0 {
        return Err(StoreError::OrderNotFound(id.clone()));
    }
    Ok(())
}
