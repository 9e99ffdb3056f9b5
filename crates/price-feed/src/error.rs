//! Error Types for the price feed

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Error, Debug)]
pub enum FeedError {
    /// Remote call never produced a usable answer
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Venue answered, but does not list the symbol
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Well-formed error payload returned by the venue
    #[error("Venue error {code}: {message}")]
    Venue { code: String, message: String },

    /// Factory was asked for a backend it does not know
    #[error("Unsupported exchange: {0}")]
    UnsupportedExchange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl FeedError {
    /// True when the failure happened before the venue could answer
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_))
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        self.is_transport()
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) | Self::Http(_) => {
                "The exchange could not be reached. Please try again.".into()
            }
            Self::UnknownSymbol(symbol) => format!("'{symbol}' is not traded on this exchange."),
            Self::UnsupportedExchange(name) => format!("The exchange '{name}' is not supported."),
            Self::Auth(_) => "Authentication failed. Please check your API key and secret.".into(),
            Self::Unsupported(what) => format!("This exchange does not support {what}."),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(FeedError::Transport("timed out".into()).is_transport());
        assert!(FeedError::Transport("timed out".into()).is_retryable());
        assert!(!FeedError::Auth("bad key".into()).is_retryable());
        assert!(!FeedError::UnknownSymbol("FOOUSDT".into()).is_transport());
        assert!(
            !FeedError::Venue {
                code: "-1121".into(),
                message: "Invalid symbol.".into(),
            }
            .is_transport()
        );
    }

    #[test]
    fn test_unsupported_exchange_names_value() {
        let err = FeedError::UnsupportedExchange("kraken".into());
        assert_eq!(err.to_string(), "Unsupported exchange: kraken");
        assert!(err.user_message().contains("kraken"));
    }
}
