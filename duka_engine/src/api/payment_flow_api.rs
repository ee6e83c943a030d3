use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use duka_common::Money;
use log::*;

use crate::{
    api::{
        errors::OrderFlowError,
        order_locks::OrderLocks,
        order_objects::{BalancePaymentOutcome, BalancePaymentRequest, GatewayNotification, NotificationOutcome},
    },
    db_types::{
        NewOrderPayment,
        Order,
        OrderId,
        OrderPayment,
        OrderPaymentSummary,
        OrderStatusType,
        PaymentMethod,
        PaymentRecordMethod,
        PaymentStatus,
        PaymentSummaryUpdate,
    },
    events::{EventProducers, OrderPaidEvent},
    helpers::{
        compute_amount_paid_from_payments,
        compute_balance_due,
        derive_payment_status,
        latest_paid_at,
        new_payment_id,
        normalize_phone,
    },
    traits::{
        GatewayOrder,
        GatewayOrderRequest,
        GatewaySettlement,
        GatewayTransactionStatus,
        OrderStore,
        PaymentGateway,
        StoreError,
    },
};

/// Computes the finance state of an order from its full payment history.
pub fn summarize_payments(order: &Order, payments: &[OrderPayment]) -> (OrderPaymentSummary, PaymentSummaryUpdate) {
    let amount_paid = compute_amount_paid_from_payments(payments);
    let statuses = payments.iter().map(|p| p.status).collect::<Vec<_>>();
    let payment_status = derive_payment_status(order.payment_method, order.total, amount_paid, &statuses);
    let balance_due = compute_balance_due(order.total, amount_paid);
    let summary =
        OrderPaymentSummary { order_id: order.id.clone(), amount_paid, total: order.total, balance_due, payment_status };
    let update = PaymentSummaryUpdate { amount_paid, balance_due, payment_status, last_payment_at: latest_paid_at(payments) };
    (summary, update)
}

/// `PaymentFlowApi` owns everything that creates or changes payment records, and the sync routine that keeps each
/// order's `amount_paid` and `payment_status` consistent with those records.
///
/// All writes to an order's payments happen under that order's lock (see [`OrderLocks`]). Clones share the same lock
/// registry, so a single instance should be created per process and cloned into request handlers.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: Arc<G>,
    locks: OrderLocks,
    producers: EventProducers,
    callback_url: Option<String>,
}

impl<B: Clone, G> Clone for PaymentFlowApi<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: Arc::clone(&self.gateway),
            locks: self.locks.clone(),
            producers: self.producers.clone(),
            callback_url: self.callback_url.clone(),
        }
    }
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateway: Arc<G>, producers: EventProducers) -> Self {
        Self { db, gateway, locks: OrderLocks::new(), producers, callback_url: None }
    }

    /// The URL the gateway sends the customer back to after payment
    pub fn with_callback_url<S: Into<String>>(mut self, url: S) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: OrderStore,
    G: PaymentGateway,
{
    /// Recomputes the order's `amount_paid`, `balance_due` and `payment_status` from its payment records and writes
    /// them back onto the order. This is the only code path that writes those fields.
    ///
    /// Returns `None` if the order does not exist. If the payments relation has not been created yet, the order is
    /// summarized as having no payments and nothing is written. Failing to write the summary is logged but does not
    /// fail the call; the computed summary is still returned.
    ///
    /// Calling this repeatedly without intervening payment changes always yields the same summary.
    ///
    /// Takes the order's lock, so a sync never interleaves with a payment write for the same order.
    pub async fn refresh_order_payment_summary(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<OrderPaymentSummary>, OrderFlowError> {
        let _guard = self.locks.lock(order_id).await;
        self.refresh_order_payment_summary_locked(order_id).await
    }

    /// As [`Self::refresh_order_payment_summary`]. The caller must hold the order's lock.
    pub(crate) async fn refresh_order_payment_summary_locked(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<OrderPaymentSummary>, OrderFlowError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            debug!("🔄️💰️ Cannot sync payments for {order_id}. The order does not exist.");
            return Ok(None);
        };
        let (payments, persist) = match self.db.fetch_payments_for_order(order_id).await {
            Ok(payments) => (payments, true),
            Err(StoreError::RelationMissing(relation)) => {
                debug!("🔄️💰️ The {relation} relation does not exist. Order {order_id} has no payment records.");
                (Vec::new(), false)
            },
            Err(e) => return Err(e.into()),
        };
        let (summary, update) = summarize_payments(&order, &payments);
        let unchanged = order.amount_paid == update.amount_paid &&
            order.payment_status == update.payment_status &&
            order.last_payment_at == update.last_payment_at;
        if persist && !unchanged {
            trace!("🔄️💰️ Saving payment summary for {order_id}: {update:?}");
            if let Err(e) = self.db.update_payment_summary(order_id, update).await {
                warn!("🔄️💰️ Could not save the payment summary for order {order_id}: {e}. Returning it anyway.");
            }
        }
        if order.payment_status != PaymentStatus::Paid && summary.payment_status == PaymentStatus::Paid {
            info!("🔄️💰️ Order {order_id} is now paid in full ({})", summary.total);
            self.producers.publish_order_paid(OrderPaidEvent::new(order, summary.clone())).await;
        }
        Ok(Some(summary))
    }

    async fn refresh_existing(&self, order_id: &OrderId) -> Result<OrderPaymentSummary, OrderFlowError> {
        self.refresh_order_payment_summary_locked(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    /// Records an installment or balance payment against an order.
    ///
    /// The request is checked in this order: the amount must be positive; the order must exist; the phone number
    /// must match the order's; the order must not be cancelled. Then, holding the order's lock, the current balance
    /// is recomputed from the payment records. The amount must not exceed that balance less any payments still
    /// awaiting settlement.
    ///
    /// * For gateway payments, a payable order is created on the gateway first. Only if that succeeds is a `pending`
    ///   record stored, and the redirect URL returned.
    /// * Bank deposits are recorded as `pending_verification`, cash on delivery as `pending`.
    ///
    /// Every successful call appends exactly one payment record.
    pub async fn create_balance_payment(
        &self,
        order_id: &OrderId,
        request: BalancePaymentRequest,
    ) -> Result<BalancePaymentOutcome, OrderFlowError> {
        if !request.amount.is_positive() {
            return Err(OrderFlowError::validation("The payment amount must be greater than zero"));
        }
        let order = self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        if normalize_phone(&request.phone) != order.phone_normalized {
            return Err(OrderFlowError::Forbidden("The phone number does not match this order".into()));
        }
        if order.status == OrderStatusType::Cancelled {
            return Err(OrderFlowError::validation("Payments cannot be made against a cancelled order"));
        }
        let _guard = self.locks.lock(order_id).await;
        let summary = self.refresh_existing(order_id).await?;
        if !summary.balance_due.is_positive() {
            return Err(OrderFlowError::AlreadyPaid(order_id.clone()));
        }
        let available = summary.balance_due.saturating_sub(self.in_flight_amount(order_id).await?);
        if request.amount > available {
            return Err(OrderFlowError::ExceedsBalance { amount: request.amount, balance: available });
        }
        info!("🔄️💰️ Recording a {} payment of {} against order {order_id}", request.method, request.amount);
        let outcome = match request.method {
            PaymentMethod::Gateway => {
                let (payment, gateway_order) =
                    self.initiate_gateway_payment(&order, request.amount, request.notes).await?;
                self.refresh_existing(order_id).await?;
                BalancePaymentOutcome::payment_required(order_id.clone(), &payment, gateway_order)
            },
            PaymentMethod::BankDeposit | PaymentMethod::CashOnDelivery => {
                let status = if request.method == PaymentMethod::BankDeposit {
                    PaymentStatus::PendingVerification
                } else {
                    PaymentStatus::Pending
                };
                let payment =
                    NewOrderPayment::new(new_payment_id(), order_id.clone(), request.amount, request.method.into(), status)
                        .with_notes(request.notes);
                let payment = self.db.insert_payment(payment).await.map_err(OrderFlowError::from_payment_insert)?;
                let summary = self.refresh_existing(order_id).await?;
                BalancePaymentOutcome::Recorded { payment, summary }
            },
        };
        Ok(outcome)
    }

    /// The sum of the order's payment records that are still awaiting settlement. These are reserved against the
    /// balance so that unconfirmed payments cannot add up to more than is owed.
    async fn in_flight_amount(&self, order_id: &OrderId) -> Result<Money, OrderFlowError> {
        let payments = match self.db.fetch_payments_for_order(order_id).await {
            Ok(payments) => payments,
            Err(StoreError::RelationMissing(_)) => return Ok(Money::ZERO),
            Err(e) => return Err(e.into()),
        };
        Ok(payments
            .iter()
            .filter(|p| matches!(p.status, PaymentStatus::Pending | PaymentStatus::PendingVerification))
            .map(|p| p.amount)
            .sum())
    }

    /// Creates a payable order on the gateway for `amount`, and stores a `pending` gateway payment record carrying
    /// the gateway's tracking id. Nothing is stored if the gateway call fails.
    ///
    /// The caller must hold the order's lock, and is responsible for syncing the order afterwards.
    pub(crate) async fn initiate_gateway_payment(
        &self,
        order: &Order,
        amount: Money,
        notes: Option<String>,
    ) -> Result<(OrderPayment, GatewayOrder), OrderFlowError> {
        let payment_id = new_payment_id();
        let request = GatewayOrderRequest {
            order_id: order.id.clone(),
            merchant_reference: payment_id.clone(),
            amount,
            description: format!("Payment for order {}", order.id),
            callback_url: self.callback_url.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.phone.clone(),
        };
        let gateway_order = self.gateway.create_order(request).await.map_err(|e| {
            warn!("🔄️💳️ The gateway could not create a payment for order {}: {e}", order.id);
            e
        })?;
        debug!("🔄️💳️ Gateway order {} created for payment {payment_id}", gateway_order.tracking_id);
        let payment = NewOrderPayment::new(
            payment_id,
            order.id.clone(),
            amount,
            PaymentRecordMethod::Gateway,
            PaymentStatus::Pending,
        )
        .with_reference(gateway_order.merchant_reference.clone())
        .with_tracking_id(gateway_order.tracking_id.clone())
        .with_notes(notes);
        let payment = self.db.insert_payment(payment).await.map_err(|e| {
            error!(
                "🔄️💳️ Gateway order {} was created but the payment record for order {} could not be saved: {e}",
                gateway_order.tracking_id, order.id
            );
            OrderFlowError::from_payment_insert(e)
        })?;
        Ok((payment, gateway_order))
    }

    /// Ingests a gateway return or webhook delivery.
    ///
    /// The gateway is asked for the transaction status; the matching payment record is found by tracking id, or
    /// failing that by merchant reference (which is the payment id). A `pending` record moves to `paid` when the
    /// gateway reports completion and to `failed` when it reports failure or reversal. An `invalid` report means the
    /// customer has not finished checking out, and leaves the record pending. A `failed` gateway record still moves to
    /// `paid` if the gateway later reports completion on the same tracking id. Redelivery of the same notification
    /// changes nothing. The owning order is always synced.
    pub async fn process_gateway_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<NotificationOutcome, OrderFlowError> {
        let status = self.gateway.transaction_status(&notification.tracking_id).await?;
        debug!("🔄️💳️ Gateway reports {} for tracking id {}", status.status, notification.tracking_id);
        let payment = self.find_gateway_payment(&notification, &status).await?;
        let order_id = payment.order_id.clone();
        let _guard = self.locks.lock(&order_id).await;
        let payment = self.apply_gateway_status(&payment.id, &status).await?;
        let summary = self.refresh_existing(&order_id).await?;
        Ok(NotificationOutcome { payment, summary })
    }

    async fn find_gateway_payment(
        &self,
        notification: &GatewayNotification,
        status: &GatewayTransactionStatus,
    ) -> Result<OrderPayment, OrderFlowError> {
        if let Some(payment) = self.db.fetch_payment_by_tracking_id(&notification.tracking_id).await? {
            return Ok(payment);
        }
        let references = [notification.merchant_reference.as_deref(), status.merchant_reference.as_deref()];
        for reference in references.into_iter().flatten() {
            if let Some(payment) = self.db.fetch_payment(reference).await? {
                return Ok(payment);
            }
        }
        warn!("🔄️💳️ No payment record matches gateway tracking id {}", notification.tracking_id);
        Err(OrderFlowError::PaymentNotFound(notification.tracking_id.clone()))
    }

    /// Moves a record to the state the gateway reports. The caller must hold the order's lock.
    ///
    /// `pending` records follow any settlement. A `failed` gateway record can only move to `paid`, and only while the
    /// order's balance still covers it.
    async fn apply_gateway_status(
        &self,
        payment_id: &str,
        status: &GatewayTransactionStatus,
    ) -> Result<OrderPayment, OrderFlowError> {
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or_else(|| OrderFlowError::PaymentNotFound(payment_id.into()))?;
        let target = match status.status {
            GatewaySettlement::Completed => PaymentStatus::Paid,
            _ if status.is_paid => PaymentStatus::Paid,
            GatewaySettlement::Failed | GatewaySettlement::Reversed => PaymentStatus::Failed,
            GatewaySettlement::Pending | GatewaySettlement::Invalid => return Ok(payment),
        };
        if payment.status == target {
            debug!("🔄️💳️ Payment {} is already {target}. Nothing to do.", payment.id);
            return Ok(payment);
        }
        let late_completion = payment.status == PaymentStatus::Failed &&
            payment.method == PaymentRecordMethod::Gateway &&
            target == PaymentStatus::Paid;
        if late_completion {
            let summary = self.refresh_existing(&payment.order_id).await?;
            if payment.amount > summary.balance_due {
                error!(
                    "🔄️💳️ The gateway completed payment {} of {} after it had failed, but order {} only owes {}. The \
                     payment stays failed and must be refunded or reconciled by hand.",
                    payment.id, payment.amount, payment.order_id, summary.balance_due
                );
                return Ok(payment);
            }
            warn!("🔄️💳️ The gateway completed payment {} after it had failed. Marking it paid.", payment.id);
        } else if payment.status != PaymentStatus::Pending {
            warn!(
                "🔄️💳️ The gateway reports {} for payment {}, but it is {}. Only pending payments are updated.",
                status.status, payment.id, payment.status
            );
            return Ok(payment);
        }
        if let Some(amount) = status.amount.filter(|a| *a != payment.amount) {
            warn!("🔄️💳️ The gateway settled {amount} for payment {}, which was for {}", payment.id, payment.amount);
        }
        let paid_at = (target == PaymentStatus::Paid).then(Utc::now);
        let payment = self.db.update_payment_status(&payment.id, target, paid_at).await?;
        info!("🔄️💳️ Payment {} for order {} is now {target}", payment.id, payment.order_id);
        Ok(payment)
    }

    /// Polls the gateway for every `pending` gateway record of the order and applies any settlement it reports.
    /// An `invalid` report leaves the record pending, since the customer may still be checking out.
    ///
    /// Best-effort: gateway failures are logged and the record left as it is. Returns the number of records updated.
    pub async fn reconcile_pending_gateway_payments(&self, order_id: &OrderId) -> Result<usize, OrderFlowError> {
        let payments = match self.db.fetch_payments_for_order(order_id).await {
            Ok(payments) => payments,
            Err(StoreError::RelationMissing(_)) => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let pending = payments.into_iter().filter(|p| {
            p.method == PaymentRecordMethod::Gateway && p.status == PaymentStatus::Pending && p.tracking_id.is_some()
        });
        let mut updated = 0;
        for payment in pending {
            let tracking_id = payment.tracking_id.as_deref().unwrap_or_default();
            let status = match self.gateway.transaction_status(tracking_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("🔄️💳️ Could not poll the gateway for payment {} ({tracking_id}): {e}", payment.id);
                    continue;
                },
            };
            if matches!(status.status, GatewaySettlement::Pending | GatewaySettlement::Invalid) && !status.is_paid {
                continue;
            }
            let _guard = self.locks.lock(order_id).await;
            let after = self.apply_gateway_status(&payment.id, &status).await?;
            if after.status != payment.status {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Marks a `pending_verification` (bank deposit) or `pending` payment record as paid, and syncs its order.
    ///
    /// Confirming a payment that would take the order's paid amount above its total is refused.
    pub async fn confirm_payment(&self, payment_id: &str) -> Result<NotificationOutcome, OrderFlowError> {
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or_else(|| OrderFlowError::PaymentNotFound(payment_id.into()))?;
        let order_id = payment.order_id.clone();
        let _guard = self.locks.lock(&order_id).await;
        // Re-read under the lock
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or_else(|| OrderFlowError::PaymentNotFound(payment_id.into()))?;
        match payment.status {
            PaymentStatus::PendingVerification | PaymentStatus::Pending => {},
            PaymentStatus::Paid => return Err(OrderFlowError::NoOp),
            other => {
                return Err(OrderFlowError::IllegalStatusChange {
                    what: "payment status",
                    from: other.to_string(),
                    to: PaymentStatus::Paid.to_string(),
                })
            },
        }
        let summary = self.refresh_existing(&order_id).await?;
        if payment.amount > summary.balance_due {
            return Err(OrderFlowError::ExceedsBalance { amount: payment.amount, balance: summary.balance_due });
        }
        let payment = self.db.update_payment_status(payment_id, PaymentStatus::Paid, Some(Utc::now())).await?;
        info!("🔄️💰️ Payment {payment_id} of {} for order {order_id} confirmed", payment.amount);
        let summary = self.refresh_existing(&order_id).await?;
        Ok(NotificationOutcome { payment, summary })
    }

    /// Settles the outstanding balance of an order with a `manual` payment record, then syncs it.
    pub async fn settle_order_manually(&self, order_id: &OrderId) -> Result<OrderPaymentSummary, OrderFlowError> {
        let _guard = self.locks.lock(order_id).await;
        self.settle_order_manually_locked(order_id).await
    }

    /// As [`Self::settle_order_manually`]. The caller must hold the order's lock.
    pub(crate) async fn settle_order_manually_locked(
        &self,
        order_id: &OrderId,
    ) -> Result<OrderPaymentSummary, OrderFlowError> {
        let summary = self.refresh_existing(order_id).await?;
        if !summary.balance_due.is_positive() {
            return Err(OrderFlowError::AlreadyPaid(order_id.clone()));
        }
        let payment = NewOrderPayment::new(
            new_payment_id(),
            order_id.clone(),
            summary.balance_due,
            PaymentRecordMethod::Manual,
            PaymentStatus::Paid,
        )
        .with_notes(Some("Marked as paid by an administrator".to_string()));
        let payment = self.db.insert_payment(payment).await.map_err(OrderFlowError::from_payment_insert)?;
        info!("🔄️💰️ Order {order_id} settled manually with payment {} of {}", payment.id, payment.amount);
        self.refresh_existing(order_id).await
    }
}
