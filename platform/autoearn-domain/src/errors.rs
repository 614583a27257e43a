use thiserror::Error;

/// Rejection of a single market-data update. The engine keeps its prior state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("malformed candle: {0}")]
    Malformed(String),
    #[error("invalid {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("percent change undefined: open price is zero")]
    DivisionByZero,
    #[error("open price must be > 0, got {0}")]
    NonPositiveOpen(f64),
}

/// Failure reported by the order-execution collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("order {client_order_id} was acknowledged without an order id")]
    MissingOrderId { client_order_id: String },
    #[error("invalid fill: {0}")]
    InvalidFill(String),
}

/// Invalid startup configuration; fatal, never raised mid-stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid config {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
