use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderPaymentSummary};

/// Emitted when payment sync moves an order's derived payment status into `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    /// The order, with its finance fields already updated from `summary`
    pub order: Order,
    pub summary: OrderPaymentSummary,
}

impl OrderPaidEvent {
    pub fn new(order: Order, summary: OrderPaymentSummary) -> Self {
        let order = order.with_summary(&summary);
        Self { order, summary }
    }
}
