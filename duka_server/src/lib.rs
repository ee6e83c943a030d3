//! # Duka server
//! This crate hosts the HTTP server for the Duka storefront. It is responsible for:
//! * Taking orders at checkout and starting their payment.
//! * Accepting installment and balance payments against existing orders.
//! * Receiving payment notifications from the Pesapal gateway, both as browser callbacks and as IPN webhooks.
//! * Letting customers look up their orders by phone number, and review delivered orders.
//! * Admin order management, behind a shared-secret header.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /orders`: Checkout.
//! * `GET /account/orders?phone=&order=`: Orders and payment history for a phone number.
//! * `POST /orders/{id}/payments`: Installment and balance payments.
//! * `GET /payments/gateway/callback`: The customer's browser returning from the gateway.
//! * `GET|POST /payments/gateway/ipn`: Gateway payment notifications.
//! * `POST /orders/{id}/review` and `GET /products/{id}/reviews`: Product reviews.
//! * `PATCH /orders/{id}`, `POST /admin/payments/{id}/confirm`, `GET /admin/orders` and `GET /admin/orders/{id}`:
//!   Admin routes. These require the `x-admin-secret` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
