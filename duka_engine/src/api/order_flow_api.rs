use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use duka_common::Money;
use log::*;

use crate::{
    api::{
        errors::OrderFlowError,
        order_objects::{ModifyOrderRequest, NewOrderOutcome, NewOrderRequest},
        payment_flow_api::PaymentFlowApi,
    },
    db_types::{
        NewOrder,
        NewOrderPayment,
        Order,
        OrderId,
        OrderLineItem,
        OrderStatusType,
        PaymentMethod,
        PaymentRecordMethod,
        PaymentStatus,
    },
    helpers::{derive_payment_status, new_order_id, new_payment_id, valid_phone, MIN_PHONE_DIGITS},
    traits::{OrderQueryFilter, OrderStore, OrderUpdate, PaymentGateway, ProductCatalog},
};

/// `OrderFlowApi` handles the life cycle of an order: checkout, fulfilment status changes and administrative
/// adjustments. Anything that touches payment records is delegated to the [`PaymentFlowApi`] it wraps.
pub struct OrderFlowApi<B, G, C> {
    payments: PaymentFlowApi<B, G>,
    catalog: Arc<C>,
}

impl<B: Clone, G, C> Clone for OrderFlowApi<B, G, C> {
    fn clone(&self) -> Self {
        Self { payments: self.payments.clone(), catalog: Arc::clone(&self.catalog) }
    }
}

impl<B, G, C> Debug for OrderFlowApi<B, G, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G, C> OrderFlowApi<B, G, C> {
    pub fn new(payments: PaymentFlowApi<B, G>, catalog: Arc<C>) -> Self {
        Self { payments, catalog }
    }

    pub fn payments(&self) -> &PaymentFlowApi<B, G> {
        &self.payments
    }
}

/// The most units of one product that a single order line may carry
pub const MAX_LINE_QUANTITY: u32 = 1_000;

fn too_large() -> OrderFlowError {
    OrderFlowError::validation("The order total is too large")
}

/// Checks a fulfilment status change.
///
/// | From \ To | pending | confirmed | delivered | cancelled |
/// |-----------|---------|-----------|-----------|-----------|
/// | pending   | no-op   | ok        | Err       | ok        |
/// | confirmed | Err     | no-op     | ok        | ok        |
/// | delivered | Err     | Err       | no-op     | Err       |
/// | cancelled | ok      | Err       | Err       | no-op     |
///
/// Reopening a cancelled order puts it back to `pending`.
pub fn check_status_change(from: OrderStatusType, to: OrderStatusType) -> Result<(), OrderFlowError> {
    use OrderStatusType::*;
    match (from, to) {
        (old, new) if old == new => Err(OrderFlowError::NoOp),
        (Pending, Confirmed | Cancelled) | (Confirmed, Delivered | Cancelled) | (Cancelled, Pending) => Ok(()),
        (old, new) => Err(OrderFlowError::IllegalStatusChange {
            what: "order status",
            from: old.to_string(),
            to: new.to_string(),
        }),
    }
}

impl<B, G, C> OrderFlowApi<B, G, C>
where
    B: OrderStore,
    G: PaymentGateway,
    C: ProductCatalog,
{
    /// Validates, prices and stores a new order, then starts the payment flow for its payment method.
    ///
    /// Prices always come from the product catalog. The order is stored before any payment is initiated, so if the
    /// gateway fails the order remains, without a payment record, and the gateway error is returned.
    pub async fn process_new_order(&self, request: NewOrderRequest) -> Result<NewOrderOutcome, OrderFlowError> {
        let new_order = self.price_order(request)?;
        let deposit = new_order.deposit_amount.filter(|_| new_order.installment_enabled);
        let order = self.payments.db().insert_order(new_order).await?;
        let order_id = order.id.clone();
        info!("🔄️📦️ Order {order_id} placed by {} for {} ({})", order.customer_name, order.total, order.payment_method);
        let _guard = self.payments.locks().lock(&order_id).await;
        let outcome = match order.payment_method {
            PaymentMethod::Gateway => {
                let amount = deposit.unwrap_or(order.total);
                let (_payment, gateway_order) = self.payments.initiate_gateway_payment(&order, amount, None).await?;
                self.payments.refresh_order_payment_summary_locked(&order_id).await?;
                NewOrderOutcome::PaymentRequired {
                    id: order_id,
                    redirect_url: gateway_order.redirect_url,
                    tracking_id: gateway_order.tracking_id,
                }
            },
            PaymentMethod::BankDeposit if deposit.is_some() => {
                let amount = deposit.unwrap_or(order.total);
                let payment = NewOrderPayment::new(
                    new_payment_id(),
                    order_id.clone(),
                    amount,
                    PaymentRecordMethod::BankDeposit,
                    PaymentStatus::PendingVerification,
                )
                .with_notes(Some("Installment deposit".to_string()));
                self.payments.db().insert_payment(payment).await.map_err(OrderFlowError::from_payment_insert)?;
                self.created_outcome(order).await?
            },
            PaymentMethod::BankDeposit | PaymentMethod::CashOnDelivery => self.created_outcome(order).await?,
        };
        Ok(outcome)
    }

    /// The caller must hold the order's lock.
    async fn created_outcome(&self, order: Order) -> Result<NewOrderOutcome, OrderFlowError> {
        let summary = self.payments.refresh_order_payment_summary_locked(&order.id).await?;
        let payment_status = summary.map_or(order.payment_status, |s| s.payment_status);
        Ok(NewOrderOutcome::Created { id: order.id, status: order.status, payment_status, total: order.total })
    }

    /// Turns a checkout request into a fully priced [`NewOrder`].
    fn price_order(&self, request: NewOrderRequest) -> Result<NewOrder, OrderFlowError> {
        let customer_name = non_empty(request.customer_name, "customer name")?;
        let region = non_empty(request.region, "region")?;
        let address = non_empty(request.address, "address")?;
        let phone_normalized = valid_phone(&request.phone).ok_or_else(|| {
            OrderFlowError::Validation(format!("The phone number must contain at least {MIN_PHONE_DIGITS} digits"))
        })?;
        if request.items.is_empty() {
            return Err(OrderFlowError::validation("An order must contain at least one item"));
        }
        let mut order_items = Vec::with_capacity(request.items.len());
        for line in request.items {
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                return Err(OrderFlowError::Validation(format!(
                    "The quantity of {} must be between 1 and {MAX_LINE_QUANTITY}",
                    line.product_id
                )));
            }
            let product = self
                .catalog
                .product(&line.product_id)
                .ok_or_else(|| OrderFlowError::Validation(format!("Unknown product: {}", line.product_id)))?;
            if !product.in_stock {
                return Err(OrderFlowError::Validation(format!("{} is out of stock", product.name)));
            }
            let free_quantity = product.promo.map(|p| p.free_units(line.quantity)).unwrap_or(0);
            let paid_quantity = line.quantity - free_quantity;
            order_items.push(OrderLineItem {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: line.quantity,
                paid_quantity,
                free_quantity,
                unit_price: product.price,
                original_unit_price: product.original_price(),
                subtotal: product.price.checked_times(paid_quantity).ok_or_else(too_large)?,
                size: line.size.filter(|s| !s.trim().is_empty()),
                color: line.color.filter(|s| !s.trim().is_empty()),
            });
        }
        let subtotal = Money::checked_sum(order_items.iter().map(|i| i.subtotal)).ok_or_else(too_large)?;
        let shipping_fee = self.catalog.shipping_fee(&region);
        let total = subtotal.checked_add(shipping_fee).ok_or_else(too_large)?;
        if let Some(deposit) = request.deposit_amount.filter(|_| request.installment_enabled) {
            if !deposit.is_positive() || deposit > total {
                return Err(OrderFlowError::Validation(format!(
                    "The deposit must be greater than zero and no more than the order total of {total}"
                )));
            }
        }
        let payment_method = request.payment_method.unwrap_or_default();
        Ok(NewOrder {
            id: new_order_id(),
            customer_name,
            phone: request.phone.trim().to_string(),
            phone_normalized,
            region,
            address,
            order_items,
            subtotal,
            shipping_fee,
            shipping_adjustment: Money::ZERO,
            total,
            payment_method,
            payment_status: derive_payment_status(payment_method, total, Money::ZERO, &[]),
            installment_enabled: request.installment_enabled,
            deposit_amount: request.deposit_amount.filter(|_| request.installment_enabled),
            installment_notes: request.installment_notes.filter(|n| !n.trim().is_empty()),
            created_at: Utc::now(),
        })
    }

    /// Fetches an order with its payment summary freshly synced.
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let summary = self.payments.refresh_order_payment_summary(order_id).await?;
        let order = self.payments.db().fetch_order(order_id).await?;
        Ok(order.map(|o| match &summary {
            Some(s) => o.with_summary(s),
            None => o,
        }))
    }

    /// Lists orders for the admin dashboard, newest first. Every order is synced before it is returned, and then
    /// optionally filtered by its derived payment status.
    pub async fn search_orders(
        &self,
        query: OrderQueryFilter,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Vec<Order>, OrderFlowError> {
        debug!("🔄️📦️ Searching orders: {query}");
        let orders = self.payments.db().search_orders(query).await?;
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let order = match self.payments.refresh_order_payment_summary(&order.id).await? {
                Some(summary) => order.with_summary(&summary),
                None => order,
            };
            if payment_status.map_or(true, |s| s == order.payment_status) {
                result.push(order);
            }
        }
        Ok(result)
    }

    /// Applies an administrative change to an order:
    /// * `status` changes the fulfilment status, subject to [`check_status_change`].
    /// * `payment_status` may only be `paid`. It settles the outstanding balance with a manual payment record.
    /// * `shipping_adjustment` replaces the adjustment and recomputes the total, which may not drop below the amount
    ///   already paid.
    ///
    /// All checks are made before anything is written. The order is synced afterwards and returned.
    pub async fn modify_order(&self, order_id: &OrderId, request: ModifyOrderRequest) -> Result<Order, OrderFlowError> {
        if request.is_empty() {
            return Err(OrderFlowError::NoOp);
        }
        if let Some(status) = request.payment_status.filter(|s| *s != PaymentStatus::Paid) {
            return Err(OrderFlowError::Validation(format!(
                "The payment status can only be overridden to paid, not {status}"
            )));
        }
        let _guard = self.payments.locks().lock(order_id).await;
        let db = self.payments.db();
        let order = db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let mut update = OrderUpdate::default();
        let other_changes = request.payment_status.is_some() || request.shipping_adjustment.is_some();
        match request.status {
            // Restating the current status alongside other changes is not an error
            Some(status) if status == order.status && other_changes => {},
            Some(status) => {
                check_status_change(order.status, status)?;
                update = update.with_status(status);
            },
            None => {},
        }
        if let Some(adjustment) = request.shipping_adjustment {
            let total = order
                .subtotal
                .checked_add(order.shipping_fee)
                .and_then(|t| t.checked_add(adjustment))
                .ok_or_else(too_large)?;
            let summary = self.payments.refresh_order_payment_summary_locked(order_id).await?;
            let amount_paid = summary.map_or(order.amount_paid, |s| s.amount_paid);
            if total.cents() < 0 || total < amount_paid {
                return Err(OrderFlowError::Validation(format!(
                    "A shipping adjustment of {adjustment} would make the total {total}, which is less than the {amount_paid} \
                     already paid"
                )));
            }
            update = update.with_shipping_adjustment(adjustment, total);
        }
        if !update.is_empty() {
            db.update_order(order_id, update).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
            info!("🔄️📦️ Order {order_id} updated");
        }
        if request.payment_status == Some(PaymentStatus::Paid) {
            self.payments.settle_order_manually_locked(order_id).await?;
        }
        let summary = self.payments.refresh_order_payment_summary_locked(order_id).await?;
        let order = db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        Ok(match summary {
            Some(s) => order.with_summary(&s),
            None => order,
        })
    }
}

fn non_empty(value: String, field: &str) -> Result<String, OrderFlowError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(OrderFlowError::Validation(format!("The {field} is required")));
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use OrderStatusType::*;

    #[test]
    fn status_transitions() {
        assert!(check_status_change(Pending, Confirmed).is_ok());
        assert!(check_status_change(Pending, Cancelled).is_ok());
        assert!(check_status_change(Confirmed, Delivered).is_ok());
        assert!(check_status_change(Confirmed, Cancelled).is_ok());
        assert!(check_status_change(Cancelled, Pending).is_ok());
        for s in [Pending, Confirmed, Delivered, Cancelled] {
            assert!(matches!(check_status_change(s, s), Err(OrderFlowError::NoOp)));
        }
        for (from, to) in [
            (Pending, Delivered),
            (Confirmed, Pending),
            (Delivered, Pending),
            (Delivered, Confirmed),
            (Delivered, Cancelled),
            (Cancelled, Confirmed),
            (Cancelled, Delivered),
        ] {
            assert!(matches!(check_status_change(from, to), Err(OrderFlowError::IllegalStatusChange { .. })));
        }
    }
}
