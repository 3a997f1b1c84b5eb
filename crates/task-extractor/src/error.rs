use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no message content")]
    EmptyResponse,

    #[error("no JSON array found in model output: {0}")]
    NotAnArray(String),

    #[error("element {0} of the model output is not an object")]
    NotAnObject(usize),

    #[error("failed to parse model output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid extractor settings: {0}")]
    Settings(String),
}
