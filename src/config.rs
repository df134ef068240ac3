//! Platform configuration
//!
//! Endpoint and credentials for the policy authority and key service. There
//! are no built-in fallbacks: a missing endpoint or missing credentials is a
//! configuration error, never a silent default.

use crate::error::NanoTdfError;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

pub const ENV_PLATFORM_ENDPOINT: &str = "OPENTDF_PLATFORM_ENDPOINT";
pub const ENV_CLIENT_ID: &str = "OPENTDF_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "OPENTDF_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "OPENTDF_ACCESS_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "OPENTDF_REQUEST_TIMEOUT_SECS";

/// Request timeout when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials presented to the platform
///
/// Token acquisition is not performed here: a bearer token is sent as is and
/// client credentials are sent as HTTP basic auth.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Credentials {
    #[serde(rename_all = "camelCase")]
    ClientSecret {
        client_id: String,
        client_secret: String,
    },
    Bearer(String),
}

impl Credentials {
    /// Attach these credentials to an outgoing request
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::ClientSecret {
                client_id,
                client_secret,
            } => request.basic_auth(client_id, Some(client_secret)),
            Credentials::Bearer(token) => request.bearer_auth(token),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ClientSecret { client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// Connection settings for the platform
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub platform_endpoint: String,
    pub credentials: Credentials,
    #[serde(
        rename = "requestTimeoutSecs",
        default = "default_timeout",
        deserialize_with = "timeout_from_secs"
    )]
    pub request_timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn timeout_from_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = u64::deserialize(deserializer)?;
    if secs == 0 {
        return Err(serde::de::Error::custom("request timeout must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

impl PlatformConfig {
    pub fn new(platform_endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            platform_endpoint: platform_endpoint.into(),
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load from the `OPENTDF_*` environment variables
    pub fn from_env() -> Result<Self, NanoTdfError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, test map, ...)
    ///
    /// An access token takes precedence over client credentials. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NanoTdfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let platform_endpoint = get(ENV_PLATFORM_ENDPOINT)
            .ok_or_else(|| NanoTdfError::Config(format!("{ENV_PLATFORM_ENDPOINT} is not set")))?;
        if !platform_endpoint.starts_with("http://") && !platform_endpoint.starts_with("https://")
        {
            return Err(NanoTdfError::Config(format!(
                "{ENV_PLATFORM_ENDPOINT} must start with http:// or https://"
            )));
        }

        let credentials = match (get(ENV_ACCESS_TOKEN), get(ENV_CLIENT_ID), get(ENV_CLIENT_SECRET)) {
            (Some(token), _, _) => Credentials::Bearer(token),
            (None, Some(client_id), Some(client_secret)) => Credentials::ClientSecret {
                client_id,
                client_secret,
            },
            (None, Some(_), None) => {
                return Err(NanoTdfError::Config(format!("{ENV_CLIENT_SECRET} is not set")))
            }
            (None, None, Some(_)) => {
                return Err(NanoTdfError::Config(format!("{ENV_CLIENT_ID} is not set")))
            }
            (None, None, None) => {
                return Err(NanoTdfError::Config(format!(
                    "no credentials: set {ENV_ACCESS_TOKEN} or {ENV_CLIENT_ID} and {ENV_CLIENT_SECRET}"
                )))
            }
        };

        let request_timeout = match get(ENV_REQUEST_TIMEOUT_SECS) {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(NanoTdfError::Config(format!(
                        "{ENV_REQUEST_TIMEOUT_SECS} must be a positive integer, got '{raw}'"
                    )))
                }
            },
        };

        Ok(Self {
            platform_endpoint: platform_endpoint.trim_end_matches('/').to_string(),
            credentials,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_client_credentials() {
        let config = PlatformConfig::from_lookup(lookup(&[
            (ENV_PLATFORM_ENDPOINT, "https://platform.example.com/"),
            (ENV_CLIENT_ID, "opentdf"),
            (ENV_CLIENT_SECRET, "s3cr3t"),
        ]))
        .unwrap();
        assert_eq!(config.platform_endpoint, "https://platform.example.com");
        assert_eq!(
            config.credentials,
            Credentials::ClientSecret {
                client_id: "opentdf".into(),
                client_secret: "s3cr3t".into()
            }
        );
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_access_token_preferred() {
        let config = PlatformConfig::from_lookup(lookup(&[
            (ENV_PLATFORM_ENDPOINT, "http://localhost:8080"),
            (ENV_ACCESS_TOKEN, "eyJhbGciOi"),
            (ENV_CLIENT_ID, "opentdf"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.credentials, Credentials::Bearer("eyJhbGciOi".into()));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_no_default_secret() {
        let err = PlatformConfig::from_lookup(lookup(&[
            (ENV_PLATFORM_ENDPOINT, "https://platform.example.com"),
            (ENV_CLIENT_ID, "opentdf"),
        ]))
        .unwrap_err();
        assert!(matches!(err, NanoTdfError::Config(msg) if msg.contains(ENV_CLIENT_SECRET)));
    }

    #[test]
    fn test_missing_credentials_and_endpoint() {
        assert!(matches!(
            PlatformConfig::from_lookup(lookup(&[(
                ENV_PLATFORM_ENDPOINT,
                "https://platform.example.com"
            )])),
            Err(NanoTdfError::Config(_))
        ));
        assert!(matches!(
            PlatformConfig::from_lookup(lookup(&[(ENV_ACCESS_TOKEN, "token")])),
            Err(NanoTdfError::Config(msg)) if msg.contains(ENV_PLATFORM_ENDPOINT)
        ));
    }

    #[test]
    fn test_rejects_schemeless_endpoint_and_bad_timeout() {
        assert!(PlatformConfig::from_lookup(lookup(&[
            (ENV_PLATFORM_ENDPOINT, "localhost:8080"),
            (ENV_ACCESS_TOKEN, "token"),
        ]))
        .is_err());
        assert!(PlatformConfig::from_lookup(lookup(&[
            (ENV_PLATFORM_ENDPOINT, "http://localhost:8080"),
            (ENV_ACCESS_TOKEN, "token"),
            (ENV_REQUEST_TIMEOUT_SECS, "0"),
        ]))
        .is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PlatformConfig::new(
            "https://platform.example.com",
            Credentials::ClientSecret {
                client_id: "opentdf".into(),
                client_secret: "s3cr3t".into(),
            },
        );
        let rendered = format!("{config:?}");
        assert!(rendered.contains("opentdf"));
        assert!(!rendered.contains("s3cr3t"));
        assert!(!format!("{:?}", Credentials::Bearer("tok123".into())).contains("tok123"));
    }

    #[test]
    fn test_deserialize() {
        let config: PlatformConfig = serde_json::from_str(
            r#"{
                "platformEndpoint": "https://platform.example.com",
                "credentials": {"clientSecret": {"clientId": "opentdf", "clientSecret": "s3cr3t"}},
                "requestTimeoutSecs": 12
            }"#,
        )
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(12));

        let config: PlatformConfig = serde_json::from_str(
            r#"{"platformEndpoint": "https://p", "credentials": {"bearer": "t"}}"#,
        )
        .unwrap();
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
