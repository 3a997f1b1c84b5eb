use crate::types::OrderId;
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FollowupError {
    #[error("not initialized: run 'followup init'")]
    NotInitialized,

    #[error("due date {due} is before today ({today})")]
    PastDate { due: NaiveDateTime, today: NaiveDate },

    #[error("invalid due date-time '{0}': expected YYYY-MM-DD HH:MM")]
    InvalidDateTime(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("crm gateway error: {0}")]
    Gateway(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FollowupError>;
