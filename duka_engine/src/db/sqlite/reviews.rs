use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProductReview, OrderId, ProductReview},
    traits::StoreError,
};

pub async fn insert_review(review: NewProductReview, conn: &mut SqliteConnection) -> Result<ProductReview, StoreError> {
    if fetch_review_for_order(&review.order_id, conn).await?.is_some() {
        return Err(StoreError::ReviewAlreadyExists(review.order_id));
    }
    let review: ProductReview = sqlx::query_as(
        r#"
            INSERT INTO product_reviews (order_id, product_id, customer_name, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(review.order_id)
    .bind(review.product_id)
    .bind(review.customer_name)
    .bind(review.rating)
    .bind(review.comment)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Review #{} saved for order {}", review.id, review.order_id);
    Ok(review)
}

pub async fn fetch_review_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<ProductReview>, StoreError> {
    let review = sqlx::query_as("SELECT * FROM product_reviews WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(review)
}

pub async fn fetch_reviews_for_product(
    product_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductReview>, StoreError> {
    let reviews = sqlx::query_as("SELECT * FROM product_reviews WHERE product_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    Ok(reviews)
}
