//! Glue between the engine and the world outside the server.
//!
//! * [`pesapal`] implements the engine's payment gateway contract on top of the Pesapal client.
//! * [`notifications`] holds the hooks that react to engine events.
pub mod notifications;
#[cfg(feature = "pesapal")]
pub mod pesapal;

#[cfg(not(feature = "pesapal"))]
pub use disabled::DisabledGateway;

#[cfg(not(feature = "pesapal"))]
mod disabled {
    use duka_engine::traits::{
        GatewayError,
        GatewayOrder,
        GatewayOrderRequest,
        GatewayTransactionStatus,
        PaymentGateway,
    };

    /// Stands in for the gateway when the server is built without Pesapal support. Every call fails with
    /// [`GatewayError::NotConfigured`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DisabledGateway;

    impl PaymentGateway for DisabledGateway {
        async fn create_order(&self, _request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
            Err(GatewayError::NotConfigured)
        }

        async fn transaction_status(&self, _tracking_id: &str) -> Result<GatewayTransactionStatus, GatewayError> {
            Err(GatewayError::NotConfigured)
        }
    }
}
