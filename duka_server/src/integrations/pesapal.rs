//! Pesapal as the storefront's hosted payment gateway.
//!
//! [`PesapalGateway`] adapts [`PesapalApi`] to the engine's [`PaymentGateway`] contract. Every call is bounded by the
//! client timeout in [`PesapalConfig`], and a timed-out call is reported as [`GatewayError::Timeout`].
use duka_common::Money;
use duka_engine::traits::{
    GatewayError,
    GatewayOrder,
    GatewayOrderRequest,
    GatewaySettlement,
    GatewayTransactionStatus,
    PaymentGateway,
};
use log::*;
use pesapal_tools::{
    pesapal_amount,
    split_customer_name,
    BillingAddress,
    IpnRegistration,
    PesapalApi,
    PesapalApiError,
    PesapalConfig,
    StatusCode,
    SubmitOrderRequest,
    TransactionStatus,
};

/// Pesapal truncates order descriptions longer than this
const MAX_DESCRIPTION_LENGTH: usize = 100;
const BILLING_COUNTRY_CODE: &str = "TZ";

#[derive(Clone)]
pub struct PesapalGateway {
    api: PesapalApi,
}

impl PesapalGateway {
    pub fn new(config: PesapalConfig) -> Result<Self, PesapalApiError> {
        let api = PesapalApi::new(config)?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &PesapalApi {
        &self.api
    }

    /// Looks the configured IPN id up among the merchant's registered IPN endpoints, and logs what it finds.
    /// Without a registered IPN, gateway payments only settle on the customer's return or on an account lookup.
    pub async fn check_ipn_registration(&self) -> bool {
        let config = self.api.config();
        if !config.is_configured() {
            warn!("💳️ Pesapal credentials are not set. Gateway payments will be refused.");
            return false;
        }
        match self.api.registered_ipns().await {
            Ok(registrations) => {
                let registered = ipn_is_registered(&config.ipn_id, &registrations);
                if registered {
                    info!("💳️ Pesapal IPN {} is registered", config.ipn_id);
                } else {
                    let known = registrations.iter().filter_map(|r| r.ipn_id.as_deref()).collect::<Vec<_>>();
                    warn!(
                        "💳️ DUKA_PESAPAL_IPN_ID ({:?}) is not one of the registered Pesapal IPNs: {known:?}",
                        config.ipn_id
                    );
                }
                registered
            },
            Err(e) => {
                warn!("💳️ Could not list the registered Pesapal IPNs. {e}");
                false
            },
        }
    }

    fn submit_order_request(&self, request: GatewayOrderRequest) -> Result<SubmitOrderRequest, GatewayError> {
        let config = self.api.config();
        let callback_url = request.callback_url.or_else(|| config.callback_url.clone()).ok_or_else(|| {
            warn!("💳️ No callback URL is configured for Pesapal. Set DUKA_PESAPAL_CALLBACK_URL.");
            GatewayError::NotConfigured
        })?;
        let (first_name, last_name) = split_customer_name(&request.customer_name);
        let description = request.description.chars().take(MAX_DESCRIPTION_LENGTH).collect::<String>();
        Ok(SubmitOrderRequest {
            id: request.merchant_reference,
            currency: config.currency.clone(),
            amount: pesapal_amount(request.amount),
            description,
            callback_url,
            notification_id: config.ipn_id.clone(),
            billing_address: BillingAddress {
                phone_number: request.customer_phone,
                email_address: None,
                first_name,
                last_name,
                country_code: Some(BILLING_COUNTRY_CODE.to_string()),
            },
        })
    }
}

impl PaymentGateway for PesapalGateway {
    async fn create_order(&self, request: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let order_id = request.order_id.clone();
        let merchant_reference = request.merchant_reference.clone();
        let submission = self.submit_order_request(request)?;
        let response = self.api.submit_order(submission).await.map_err(|e| {
            warn!("💳️ Could not create a Pesapal order for {order_id}. {e}");
            gateway_error(e)
        })?;
        match (response.order_tracking_id, response.redirect_url) {
            (Some(tracking_id), Some(redirect_url)) => Ok(GatewayOrder {
                redirect_url,
                tracking_id,
                merchant_reference: response.merchant_reference.unwrap_or(merchant_reference),
            }),
            _ => Err(GatewayError::MalformedResponse("Pesapal did not return a tracking id and redirect URL".into())),
        }
    }

    async fn transaction_status(&self, tracking_id: &str) -> Result<GatewayTransactionStatus, GatewayError> {
        let status = self.api.transaction_status(tracking_id).await.map_err(|e| {
            warn!("💳️ Could not fetch the Pesapal status of {tracking_id}. {e}");
            gateway_error(e)
        })?;
        Ok(transaction_status_from_pesapal(status))
    }
}

fn ipn_is_registered(ipn_id: &str, registrations: &[IpnRegistration]) -> bool {
    !ipn_id.is_empty() && registrations.iter().any(|r| r.ipn_id.as_deref() == Some(ipn_id))
}

pub fn settlement_from_status_code(code: StatusCode) -> GatewaySettlement {
    match code {
        StatusCode::Completed => GatewaySettlement::Completed,
        StatusCode::Failed => GatewaySettlement::Failed,
        StatusCode::Invalid => GatewaySettlement::Invalid,
        StatusCode::Reversed => GatewaySettlement::Reversed,
        StatusCode::Unknown => GatewaySettlement::Pending,
    }
}

pub fn transaction_status_from_pesapal(status: TransactionStatus) -> GatewayTransactionStatus {
    let is_paid = status.is_completed();
    let settlement =
        if is_paid { GatewaySettlement::Completed } else { settlement_from_status_code(status.status_code()) };
    GatewayTransactionStatus {
        is_paid,
        status: settlement,
        amount: status.amount.map(Money::from_major),
        merchant_reference: status.merchant_reference,
        confirmation_code: status.confirmation_code,
        description: status.payment_status_description.or(status.description),
    }
}

pub fn gateway_error(e: PesapalApiError) -> GatewayError {
    match e {
        PesapalApiError::NotConfigured => GatewayError::NotConfigured,
        PesapalApiError::Timeout => GatewayError::Timeout,
        PesapalApiError::Rejected { message, .. } => GatewayError::Rejected { message },
        PesapalApiError::JsonError(s) => GatewayError::MalformedResponse(s),
        PesapalApiError::QueryError { status, message } => GatewayError::Request(format!("HTTP {status}. {message}")),
        PesapalApiError::Initialization(s) | PesapalApiError::RestResponseError(s) => GatewayError::Request(s),
    }
}
