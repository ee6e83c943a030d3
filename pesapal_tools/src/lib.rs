//! A thin client for the Pesapal v3 REST API.
//!
//! Every call first exchanges the consumer key and secret for a bearer token. Tokens are not cached between calls.
mod api;
mod config;
mod error;
mod helpers;

mod data_objects;

pub use api::PesapalApi;
pub use config::PesapalConfig;
pub use data_objects::{
    BillingAddress,
    IpnAcknowledgement,
    IpnRegistration,
    PesapalErrorDetail,
    StatusCode,
    SubmitOrderRequest,
    SubmitOrderResponse,
    TransactionStatus,
};
pub use error::PesapalApiError;
pub use helpers::{pesapal_amount, split_customer_name};
