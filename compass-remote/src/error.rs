//! REST adapter errors.

use compass_core::{RemoteError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum RestClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Invalid row: {0}")]
    Row(#[from] ValidationError),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("Access token lock poisoned")]
    LockPoisoned,
}

impl RestClientError {
    /// PostgREST reports unique violations as 409 with code `23505`.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RestClientError::Status { status, message } => {
                *status == 409 || message.contains("23505")
            }
            _ => false,
        }
    }
}

impl From<RestClientError> for RemoteError {
    fn from(err: RestClientError) -> Self {
        match err {
            RestClientError::Http(e) if e.is_decode() => RemoteError::Decode {
                reason: e.to_string(),
            },
            RestClientError::Http(e) => RemoteError::Transport {
                reason: e.to_string(),
            },
            RestClientError::Serde(e) => RemoteError::Decode {
                reason: e.to_string(),
            },
            RestClientError::Row(e) => RemoteError::Decode {
                reason: e.to_string(),
            },
            RestClientError::InvalidResponse(reason) => RemoteError::Decode { reason },
            RestClientError::Status { status, message } => RemoteError::Status { status, message },
            RestClientError::InvalidConfig { .. } => RemoteError::NotConfigured,
            RestClientError::LockPoisoned => RemoteError::LockPoisoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_counts_as_unique_violation() {
        let conflict = RestClientError::Status {
            status: 409,
            message: "duplicate".to_string(),
        };
        assert!(conflict.is_unique_violation());

        let coded = RestClientError::Status {
            status: 400,
            message: "23505: duplicate key value violates unique constraint".to_string(),
        };
        assert!(coded.is_unique_violation());

        let other = RestClientError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!other.is_unique_violation());
    }

    #[test]
    fn status_maps_to_remote_status() {
        let err: RemoteError = RestClientError::Status {
            status: 503,
            message: "down".to_string(),
        }
        .into();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 503,
                message: "down".to_string()
            }
        );
    }
}
