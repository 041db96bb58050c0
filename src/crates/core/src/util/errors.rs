//! Error types for the TARX client.

use std::time::Duration;

use tarx_ai_adapters::DecodeError;
use thiserror::Error;

pub type TarxResult<T> = Result<T, TarxError>;

/// Coarse classification used by retry predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Protocol,
    Timeout,
    Policy,
    Config,
}

#[derive(Debug, Error)]
pub enum TarxError {
    #[error("{backend} transport error: {message}")]
    Transport {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} error: {status} {body}")]
    Http {
        backend: &'static str,
        status: u16,
        body: String,
    },

    #[error("No response body from {backend}")]
    MissingBody { backend: &'static str },

    #[error("{backend} request timed out after {}ms", .timeout.as_millis())]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },

    #[error("Local inference unavailable. Cloud fallback disabled by policy.")]
    LocalInferenceUnavailable,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TarxError {
    pub fn transport(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            backend,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Maps a reqwest failure, keeping client-side timeouts distinguishable.
    pub fn from_reqwest(backend: &'static str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { backend, timeout }
        } else {
            Self::transport(backend, err.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Io(_) => ErrorKind::Transport,
            Self::Http { .. } | Self::MissingBody { .. } | Self::Serialization(_) => {
                ErrorKind::Protocol
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::LocalInferenceUnavailable => ErrorKind::Policy,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<DecodeError> for TarxError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Transport { backend, message } => Self::Transport { backend, message },
            DecodeError::Timeout { backend, timeout } => Self::Timeout { backend, timeout },
        }
    }
}

impl From<toml::de::Error> for TarxError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config file: {}", err))
    }
}
