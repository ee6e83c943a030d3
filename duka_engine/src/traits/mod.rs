//! # Backend contracts.
//!
//! The engine's business logic is written against these traits only, never against a concrete backend.
//!
//! * [`OrderStore`] is the storage contract. It is implemented by the SQLite database and by the in-memory store used
//!   when no database is configured.
//! * [`PaymentGateway`] is the narrow contract of the hosted payment gateway: create a payable order, and query its
//!   settlement status.
//! * [`ProductCatalog`] resolves product ids into prices and regions into shipping fees.
mod data_objects;
mod order_store;
mod payment_gateway;
mod product_catalog;

pub use data_objects::{OrderQueryFilter, OrderUpdate};
pub use order_store::{OrderStore, StoreError};
pub use payment_gateway::{
    GatewayError,
    GatewayOrder,
    GatewayOrderRequest,
    GatewaySettlement,
    GatewayTransactionStatus,
    PaymentGateway,
};
pub use product_catalog::{Product, ProductCatalog, Promotion};
