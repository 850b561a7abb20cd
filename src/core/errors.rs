use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Precision loss: {value} cannot be written with {max_decimals} decimals")]
    PrecisionLoss { value: f64, max_decimals: usize },

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Request failed with status {status}: {body}")]
    RequestError { status: u16, body: String },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Unsupported subscription: {0}")]
    UnsupportedSubscription(String),

    #[error("Stream is not connected")]
    NotConnected,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl ExchangeError {
    #[cold]
    #[inline(never)]
    pub fn encoding(details: impl Into<String>) -> Self {
        Self::EncodingError(details.into())
    }

    #[cold]
    #[inline(never)]
    pub fn key(reason: impl Into<String>) -> Self {
        Self::KeyError(reason.into())
    }

    #[cold]
    #[inline(never)]
    pub fn decode(details: impl Into<String>) -> Self {
        Self::DecodeError(details.into())
    }

    #[cold]
    #[inline(never)]
    pub fn invalid(details: impl Into<String>) -> Self {
        Self::InvalidParameters(details.into())
    }

    #[cold]
    #[inline(never)]
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::ConnectionError(reason.into())
    }

    /// Whether the failure is transient. The core never retries on its own;
    /// this only helps callers that want to.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::ConnectionTimeout(_) | Self::ConnectionError(_) => true,
            Self::RequestError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for ExchangeError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::EncodingError(err.to_string())
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::ConnectionTimeout(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ExchangeError::NetworkError("reset".into()).is_retryable());
        assert!(ExchangeError::RequestError {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(ExchangeError::RequestError {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(!ExchangeError::RequestError {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!ExchangeError::key("missing").is_retryable());
        assert!(!ExchangeError::NotConnected.is_retryable());
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(ExchangeError::from(err), ExchangeError::DecodeError(_)));
    }
}
