//! # Engine API
//!
//! The programmatic API of the engine. Each API is created by supplying an [`OrderStore`](crate::traits::OrderStore)
//! backend, and where needed a [`PaymentGateway`](crate::traits::PaymentGateway) and a
//! [`ProductCatalog`](crate::traits::ProductCatalog).
//!
//! * [`payment_flow_api`] creates and settles payment records, and owns the payment sync routine.
//! * [`order_flow_api`] handles checkout, fulfilment status changes and administrative adjustments.
//! * [`account_api`] looks up a customer's orders and payments by phone number.
//! * [`review_api`] handles product reviews.
//!
//! ```rust,ignore
//! let db = MemoryStore::new();
//! let payments = PaymentFlowApi::new(db, Arc::new(gateway), EventProducers::default());
//! let orders = OrderFlowApi::new(payments.clone(), Arc::new(catalog));
//! let outcome = orders.process_new_order(request).await?;
//! ```
//!
//! Create one `PaymentFlowApi` per process and clone it into the other APIs, so that they all share the same
//! per-order locks.
pub mod account_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_locks;
pub mod order_objects;
pub mod payment_flow_api;
pub mod review_api;
