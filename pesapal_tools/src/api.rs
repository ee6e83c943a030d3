use std::sync::Arc;

use log::*;
use reqwest::{header::HeaderValue, Client, Method};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::PesapalConfig,
    data_objects::{
        check_error,
        IpnRegistration,
        SubmitOrderRequest,
        StatusCode,
        SubmitOrderResponse,
        TokenRequest,
        TokenResponse,
        TransactionStatus,
    },
    PesapalApiError,
};

#[derive(Clone)]
pub struct PesapalApi {
    config: PesapalConfig,
    client: Arc<Client>,
}

impl PesapalApi {
    pub fn new(config: PesapalConfig) -> Result<Self, PesapalApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PesapalApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &PesapalConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, PesapalApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url).header("Accept", HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            let text = response.text().await?;
            serde_json::from_str::<T>(&text).map_err(|e| {
                warn!("💳️ Unexpected response from Pesapal: {text}");
                PesapalApiError::JsonError(e.to_string())
            })
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(PesapalApiError::QueryError { status, message })
        }
    }

    /// Exchanges the consumer credentials for a short-lived bearer token.
    pub async fn request_token(&self) -> Result<String, PesapalApiError> {
        if !self.config.is_configured() {
            return Err(PesapalApiError::NotConfigured);
        }
        let body = TokenRequest {
            consumer_key: self.config.consumer_key.reveal(),
            consumer_secret: self.config.consumer_secret.reveal(),
        };
        let response =
            self.rest_query::<TokenResponse, _>(Method::POST, "/Auth/RequestToken", None, &[], Some(body)).await?;
        check_error(response.error)?;
        response.token.filter(|t| !t.is_empty()).ok_or_else(|| PesapalApiError::Rejected {
            code: None,
            message: response.message.unwrap_or_else(|| "No token was issued".to_string()),
        })
    }

    /// Submits a payable order. The customer must be sent to the returned redirect URL to pay.
    pub async fn submit_order(&self, order: SubmitOrderRequest) -> Result<SubmitOrderResponse, PesapalApiError> {
        let token = self.request_token().await?;
        debug!("💳️ Submitting order {} for {} {}", order.id, order.amount, order.currency);
        let response = self
            .rest_query::<SubmitOrderResponse, _>(
                Method::POST,
                "/Transactions/SubmitOrderRequest",
                Some(&token),
                &[],
                Some(order),
            )
            .await?;
        check_error(response.error.clone())?;
        if response.order_tracking_id.is_none() || response.redirect_url.is_none() {
            return Err(PesapalApiError::JsonError("The response has no tracking id or redirect URL".to_string()));
        }
        info!("💳️ Pesapal order {:?} created", response.order_tracking_id);
        Ok(response)
    }

    pub async fn transaction_status(&self, tracking_id: &str) -> Result<TransactionStatus, PesapalApiError> {
        let token = self.request_token().await?;
        let params = [("orderTrackingId", tracking_id)];
        let status = self
            .rest_query::<TransactionStatus, ()>(
                Method::GET,
                "/Transactions/GetTransactionStatus",
                Some(&token),
                &params,
                None,
            )
            .await?;
        debug!("💳️ Transaction {tracking_id} is {} ({:?})", status.status_code(), status.payment_status_description);
        // Pesapal also fills `error` while a payment is in progress, so it only counts when there is no status code
        if status.status_code() == StatusCode::Unknown {
            check_error(status.error.clone())?;
        }
        Ok(status)
    }

    /// The IPN endpoints registered for this merchant account. `DUKA_PESAPAL_IPN_ID` must name one of them.
    pub async fn registered_ipns(&self) -> Result<Vec<IpnRegistration>, PesapalApiError> {
        let token = self.request_token().await?;
        self.rest_query::<Vec<IpnRegistration>, ()>(Method::GET, "/URLSetup/GetIpnList", Some(&token), &[], None).await
    }
}
