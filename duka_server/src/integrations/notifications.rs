use duka_engine::events::{EventHandlers, EventHooks};
use log::*;

pub const ORDER_EVENT_BUFFER_SIZE: usize = 25;

/// Registers the server's reactions to engine events.
///
/// When an order becomes paid in full, the shop needs to know that it can be dispatched. For now that is a log line
/// at `info` level; orders that were settled in installments are called out separately.
pub fn create_order_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev| {
        let order = ev.order;
        let summary = ev.summary;
        Box::pin(async move {
            if order.installment_enabled {
                info!(
                    "📬️ Installment plan for order {} is complete. {} paid of {}. Ready to dispatch to {}, {}.",
                    order.id, summary.amount_paid, summary.total, order.customer_name, order.region
                );
            } else {
                info!(
                    "📬️ Order {} is paid in full ({}). Ready to dispatch to {}, {}.",
                    order.id, summary.amount_paid, order.customer_name, order.region
                );
            }
        })
    });
    EventHandlers::new(ORDER_EVENT_BUFFER_SIZE, hooks)
}
