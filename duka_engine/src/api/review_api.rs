use std::fmt::Debug;

use log::*;

use crate::{
    api::{errors::OrderFlowError, order_objects::ReviewRequest},
    db_types::{NewProductReview, OrderId, OrderStatusType, ProductReview},
    helpers::normalize_phone,
    traits::{OrderStore, StoreError},
};

/// Product reviews. A review is tied to one delivered order, and each order may be reviewed once.
#[derive(Clone)]
pub struct ReviewApi<B> {
    db: B,
}

impl<B> Debug for ReviewApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReviewApi")
    }
}

impl<B> ReviewApi<B>
where B: OrderStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn submit_review(&self, order_id: &OrderId, request: ReviewRequest) -> Result<ProductReview, OrderFlowError> {
        if !(1..=5).contains(&request.rating) {
            return Err(OrderFlowError::validation("The rating must be between 1 and 5"));
        }
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if normalize_phone(&request.phone) != order.phone_normalized {
            return Err(OrderFlowError::Forbidden("The phone number does not match this order".into()));
        }
        if order.status != OrderStatusType::Delivered {
            return Err(OrderFlowError::validation("Only delivered orders can be reviewed"));
        }
        let product_id = match request.product_id {
            Some(id) if order.order_items.iter().any(|i| i.product_id == id) => id,
            Some(id) => return Err(OrderFlowError::Validation(format!("Product {id} is not part of this order"))),
            None => order
                .order_items
                .first()
                .map(|i| i.product_id.clone())
                .ok_or_else(|| OrderFlowError::validation("This order has no products to review"))?,
        };
        let review = NewProductReview {
            order_id: order_id.clone(),
            product_id,
            customer_name: order.customer_name,
            rating: request.rating,
            comment: request.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        };
        let review = self.db.insert_review(review).await.map_err(|e| match e {
            StoreError::RelationMissing(_) => OrderFlowError::validation("Reviews are not available yet"),
            other => other.into(),
        })?;
        info!("🔄️⭐️ Order {order_id} reviewed: {} stars for {}", review.rating, review.product_id);
        Ok(review)
    }

    pub async fn reviews_for_product(&self, product_id: &str) -> Result<Vec<ProductReview>, OrderFlowError> {
        match self.db.fetch_reviews_for_product(product_id).await {
            Ok(reviews) => Ok(reviews),
            Err(StoreError::RelationMissing(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
