use thiserror::Error;

#[derive(Debug, Error)]
pub enum PesapalApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Pesapal credentials have not been configured")]
    NotConfigured,
    #[error("The request to Pesapal timed out")]
    Timeout,
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    /// Pesapal answered, but reported an error in the response body
    #[error("Pesapal rejected the request. {message}")]
    Rejected { code: Option<String>, message: String },
}

impl From<reqwest::Error> for PesapalApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::RestResponseError(e.to_string())
        }
    }
}
