//! Remote store connection settings.

use crate::error::RestClientError;
use serde::Deserialize;

/// Connection settings for the hosted REST endpoint. All fields required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Project URL; tables live under `{base_url}/rest/v1/`.
    pub base_url: String,
    /// Public anonymous key, sent as `apikey` and as the bearer token until a
    /// user session supplies its own.
    pub anon_key: String,
    pub request_timeout_ms: u64,
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<(), RestClientError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(RestClientError::InvalidConfig {
                field: "remote.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RestClientError::InvalidConfig {
                field: "remote.base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.anon_key.trim().is_empty() {
            return Err(RestClientError::InvalidConfig {
                field: "remote.anon_key",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(RestClientError::InvalidConfig {
                field: "remote.request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RemoteConfig {
        RemoteConfig {
            base_url: "https://compass.example.co".to_string(),
            anon_key: "anon".to_string(),
            request_timeout_ms: 5_000,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = base();
        config.base_url = "compass.example.co".to_string();
        assert!(matches!(
            config.validate(),
            Err(RestClientError::InvalidConfig { field: "remote.base_url", .. })
        ));

        let mut config = base();
        config.anon_key = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = base();
        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_value::<RemoteConfig>(serde_json::json!({
            "base_url": "https://x.co",
            "anon_key": "k",
            "request_timeout_ms": 10,
            "service_role_key": "nope"
        }));
        assert!(parsed.is_err());
    }
}
