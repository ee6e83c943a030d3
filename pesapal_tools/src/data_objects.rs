use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize};

use crate::PesapalApiError;

//--------------------------------------     Authentication     -------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<PesapalErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The `error` object Pesapal embeds in its responses. On success it is either absent, `null`, or has every field
/// `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PesapalErrorDetail {
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PesapalErrorDetail {
    pub fn is_error(&self) -> bool {
        self.code.as_ref().is_some_and(|s| !s.is_empty()) || self.message.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn into_api_error(self) -> PesapalApiError {
        let message = self
            .message
            .filter(|m| !m.is_empty())
            .or_else(|| self.error_type.clone())
            .unwrap_or_else(|| "Unknown error".to_string());
        PesapalApiError::Rejected { code: self.code, message }
    }
}

/// Returns the embedded error, if the response carries a real one.
pub(crate) fn check_error(error: Option<PesapalErrorDetail>) -> Result<(), PesapalApiError> {
    match error {
        Some(e) if e.is_error() => Err(e.into_api_error()),
        _ => Ok(()),
    }
}

//--------------------------------------     Orders     ---------------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingAddress {
    pub phone_number: String,
    #[serde(default)]
    pub email_address: Option<String>,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Our unique reference for this payment. Pesapal echoes it back as the merchant reference.
    pub id: String,
    pub currency: String,
    pub amount: f64,
    pub description: String,
    pub callback_url: String,
    pub notification_id: String,
    pub billing_address: BillingAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderResponse {
    #[serde(default)]
    pub order_tracking_id: Option<String>,
    #[serde(default)]
    pub merchant_reference: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub error: Option<PesapalErrorDetail>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

//--------------------------------------     Transaction status     ---------------------------------------------------
/// Pesapal's `status_code` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Invalid,
    Completed,
    Failed,
    Reversed,
    /// Any other value, including a missing code. The payment has not been settled yet.
    Unknown,
}

impl From<Option<i64>> for StatusCode {
    fn from(value: Option<i64>) -> Self {
        match value {
            Some(0) => Self::Invalid,
            Some(1) => Self::Completed,
            Some(2) => Self::Failed,
            Some(3) => Self::Reversed,
            _ => Self::Unknown,
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid => write!(f, "INVALID"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Reversed => write!(f, "REVERSED"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatus {
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub confirmation_code: Option<String>,
    #[serde(default)]
    pub payment_status_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub merchant_reference: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub error: Option<PesapalErrorDetail>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

impl TransactionStatus {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from(self.status_code)
    }

    /// Some responses only carry the textual description, e.g. `"Completed"`.
    pub fn is_completed(&self) -> bool {
        self.status_code() == StatusCode::Completed ||
            self.payment_status_description.as_deref().is_some_and(|d| d.eq_ignore_ascii_case("completed"))
    }
}

//--------------------------------------     IPN     ------------------------------------------------------------------
/// One entry of the merchant's registered IPN endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpnRegistration {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub ipn_id: Option<String>,
    #[serde(default)]
    pub error: Option<PesapalErrorDetail>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

/// The body Pesapal expects in reply to an IPN delivery. Anything else makes it retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpnAcknowledgement {
    pub order_notification_type: String,
    pub order_tracking_id: String,
    pub order_merchant_reference: String,
    pub status: u16,
}

impl IpnAcknowledgement {
    pub fn new(notification_type: &str, tracking_id: &str, merchant_reference: &str, success: bool) -> Self {
        Self {
            order_notification_type: notification_type.to_string(),
            order_tracking_id: tracking_id.to_string(),
            order_merchant_reference: merchant_reference.to_string(),
            status: if success { 200 } else { 500 },
        }
    }
}

/// Pesapal sends `status` as a string in some responses and a number in others.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
