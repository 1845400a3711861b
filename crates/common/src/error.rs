use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Quote or bar fetch failed. Retryable; treated as "no signal".
    #[error("Market data unavailable: {0}")]
    MarketData(String),

    /// The broker rejected an order. No ledger state is recorded.
    #[error("Order execution failed: {0}")]
    OrderExecution(String),

    /// Trade-log write failed. Logged; never affects trade state.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Zero or negative entry price / stop-loss percentage.
    #[error("Invalid risk input: {0}")]
    InvalidRiskInput(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the next tick may simply retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::MarketData(_) | Error::Persistence(_) | Error::WebSocket(_) | Error::Http(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
