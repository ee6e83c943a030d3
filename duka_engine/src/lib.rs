//! Duka Order Engine
//!
//! The Duka engine takes storefront orders from checkout through to payment in full. It prices carts against the
//! product catalog, records every payment made against an order (gateway, bank deposit, cash on delivery, or manual
//! settlement by an administrator), and keeps each order's paid amount, outstanding balance and payment status
//! consistent with those payment records.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@db`] and [`mod@traits`]). Business logic is written against the [`traits::OrderStore`] contract.
//!    SQLite and an in-memory store are the two supported backends. SQLite deployments may be running an older
//!    schema; the store degrades gracefully instead of failing.
//! 2. The engine public API ([`mod@api`]). This provides checkout, balance payments, gateway notifications, order
//!    administration, account lookups and reviews.
//!
//! The engine also emits events that can be subscribed to. For example, when an order becomes paid in full, an
//! [`events::OrderPaidEvent`] is emitted. See [`mod@events`].
mod db;

pub mod api;
pub mod catalog;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{
    account_api::AccountApi,
    errors::OrderFlowError,
    order_flow_api::{OrderFlowApi, MAX_LINE_QUANTITY},
    order_locks::OrderLocks,
    order_objects,
    payment_flow_api::PaymentFlowApi,
    review_api::ReviewApi,
};
pub use catalog::StaticCatalog;
pub use db::memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
