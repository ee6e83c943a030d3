use std::time::Duration;

use duka_common::{Secret, DEFAULT_CURRENCY_CODE};
use log::*;

pub const SANDBOX_BASE_URL: &str = "https://cybqa.pesapal.com/pesapalv3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct PesapalConfig {
    pub base_url: String,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    /// The id Pesapal assigned to our IPN (webhook) URL when it was registered
    pub ipn_id: String,
    /// Where Pesapal sends the customer after payment
    pub callback_url: Option<String>,
    pub timeout: Duration,
    pub currency: String,
}

impl Default for PesapalConfig {
    fn default() -> Self {
        Self {
            base_url: SANDBOX_BASE_URL.to_string(),
            consumer_key: Secret::default(),
            consumer_secret: Secret::default(),
            ipn_id: String::default(),
            callback_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl PesapalConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("DUKA_PESAPAL_BASE_URL").unwrap_or_else(|_| {
            warn!("DUKA_PESAPAL_BASE_URL not set, using the Pesapal sandbox ({SANDBOX_BASE_URL})");
            SANDBOX_BASE_URL.to_string()
        });
        let consumer_key = Secret::new(std::env::var("DUKA_PESAPAL_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("DUKA_PESAPAL_CONSUMER_KEY not set. Gateway payments will be unavailable.");
            String::default()
        }));
        let consumer_secret = Secret::new(std::env::var("DUKA_PESAPAL_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("DUKA_PESAPAL_CONSUMER_SECRET not set. Gateway payments will be unavailable.");
            String::default()
        }));
        let ipn_id = std::env::var("DUKA_PESAPAL_IPN_ID").unwrap_or_else(|_| {
            warn!("DUKA_PESAPAL_IPN_ID not set. Pesapal will not be able to notify the server of payments.");
            String::default()
        });
        let callback_url = std::env::var("DUKA_PESAPAL_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
        let timeout = std::env::var("DUKA_PESAPAL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("Invalid DUKA_PESAPAL_TIMEOUT_SECS value '{s}': {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let currency = std::env::var("DUKA_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY_CODE.to_string());
        Self { base_url, consumer_key, consumer_secret, ipn_id, callback_url, timeout, currency }
    }

    /// True if credentials have been supplied
    pub fn is_configured(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.is_empty()
    }
}
