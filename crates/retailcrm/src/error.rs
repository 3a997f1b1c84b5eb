use followup_core::FollowupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} rejected the request: {message}")]
    Rejected { endpoint: String, message: String },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("order {0} not found")]
    OrderNotFound(u64),

    #[error("invalid client settings: {0}")]
    Settings(String),
}

impl From<CrmError> for FollowupError {
    fn from(e: CrmError) -> Self {
        match e {
            CrmError::OrderNotFound(id) => FollowupError::OrderNotFound(id),
            other => FollowupError::Gateway(other.to_string()),
        }
    }
}
