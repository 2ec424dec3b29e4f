use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid granularity '{0}': expected one of 1m, 5m, 15m, 1h, 6h, 1d")]
    InvalidGranularity(String),

    #[error("no trade data in period starting {0}")]
    NoDataInPeriod(DateTime<Utc>),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("exchange API error (status {status}): {msg}")]
    ExchangeApi { status: u16, msg: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
