use duka_engine::traits::{GatewayError, GatewayOrder, GatewayOrderRequest, GatewayTransactionStatus, PaymentGateway};
use mockall::mock;

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;
        async fn transaction_status(&self, tracking_id: &str) -> Result<GatewayTransactionStatus, GatewayError>;
    }
}
