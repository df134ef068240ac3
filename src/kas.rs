//! Key Access Service (KAS) locator and public key client
//!
//! Envelopes name the KAS that can release their DEK. The locator is an
//! absolute `http://` or `https://` URL; bare `host:port` values are rejected
//! rather than guessed at.
//!
//! # Example
//!
//! ```no_run
//! use opentdf_nano::kas::{KasClient, KasLocator};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let locator = KasLocator::for_platform("https://platform.example.com")?;
//! let client = KasClient::new(locator, Duration::from_secs(10))?;
//! let kas_key = client.public_key().await?;
//! println!("KAS key id: {:?}", kas_key.kid());
//! # Ok(())
//! # }
//! ```

use crate::config::{Credentials, PlatformConfig};
use crate::error::NanoTdfError;
use opentdf_nano_protocol::ResourceLocator;
use p256::pkcs8::DecodePublicKey;
use p256::PublicKey;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Algorithm requested from the KAS public key endpoint
pub const KAS_KEY_ALGORITHM: &str = "ec:secp256r1";

/// Location of a Key Access Service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KasLocator {
    url: String,
    locator: ResourceLocator,
}

impl KasLocator {
    /// Parse an absolute KAS URL
    pub fn parse(url: &str) -> Result<Self, NanoTdfError> {
        let invalid = |reason: &str| NanoTdfError::InvalidKasLocator {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = url.trim().trim_end_matches('/');
        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| invalid("missing http:// or https:// scheme"))?;

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = authority.rsplit_once(':').map_or(authority, |(host, _)| host);
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if rest.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        let locator = ResourceLocator::from_url(trimmed).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            url: trimmed.to_string(),
            locator,
        })
    }

    /// Derive the KAS locator for a platform endpoint (`<endpoint>/kas`)
    pub fn for_platform(platform_endpoint: &str) -> Result<Self, NanoTdfError> {
        let base = platform_endpoint.trim().trim_end_matches('/');
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(NanoTdfError::InvalidKasLocator {
                url: platform_endpoint.to_string(),
                reason: "missing http:// or https:// scheme".to_string(),
            });
        }
        Self::parse(&format!("{base}/kas"))
    }

    /// Rebuild a locator from the form stored in an envelope header
    pub fn from_resource_locator(locator: &ResourceLocator) -> Result<Self, NanoTdfError> {
        Self::parse(&locator.to_url())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn resource_locator(&self) -> &ResourceLocator {
        &self.locator
    }
}

impl fmt::Display for KasLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// A KAS public key together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KasPublicKey {
    locator: KasLocator,
    key: PublicKey,
    kid: Option<String>,
}

impl KasPublicKey {
    pub fn new(locator: KasLocator, key: PublicKey, kid: Option<String>) -> Self {
        Self { locator, key, kid }
    }

    /// Parse a PEM-encoded (SPKI) P-256 public key
    pub fn from_pem(
        locator: KasLocator,
        pem: &str,
        kid: Option<String>,
    ) -> Result<Self, NanoTdfError> {
        let key = PublicKey::from_public_key_pem(pem.trim())
            .map_err(|e| NanoTdfError::InvalidKasKey(e.to_string()))?;
        Ok(Self::new(locator, key, kid))
    }

    pub fn locator(&self) -> &KasLocator {
        &self.locator
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

/// Response from the KAS public key endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct KasPublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(default)]
    pub kid: Option<String>,
}

/// Client for the KAS public key endpoint
pub struct KasClient {
    http_client: Client,
    locator: KasLocator,
    credentials: Option<Credentials>,
}

impl KasClient {
    /// Create a client with a per-request timeout
    pub fn new(locator: KasLocator, timeout: Duration) -> Result<Self, NanoTdfError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NanoTdfError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            locator,
            credentials: None,
        })
    }

    /// Client for the KAS of a configured platform
    pub fn from_config(config: &PlatformConfig) -> Result<Self, NanoTdfError> {
        let locator = KasLocator::for_platform(&config.platform_endpoint)?;
        Ok(Self::new(locator, config.request_timeout)?
            .with_credentials(config.credentials.clone()))
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn locator(&self) -> &KasLocator {
        &self.locator
    }

    /// Fetch the KAS's P-256 public key
    ///
    /// Timeouts, transport failures and non-success responses are
    /// `KeyServiceUnavailable`; a response carrying an unparseable key is
    /// `InvalidKasKey`.
    pub async fn public_key(&self) -> Result<KasPublicKey, NanoTdfError> {
        let endpoint = format!("{}/v2/kas_public_key", self.locator.url());
        debug!(%endpoint, "fetching KAS public key");

        let mut request = self
            .http_client
            .get(&endpoint)
            .query(&[("algorithm", KAS_KEY_ALGORITHM)]);
        if let Some(credentials) = &self.credentials {
            request = credentials.authorize(request);
        }

        let response = request.send().await.map_err(|e| {
            warn!(%endpoint, error = %e, "KAS unreachable");
            NanoTdfError::KeyServiceUnavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%endpoint, %status, "KAS public key request failed");
            return Err(NanoTdfError::KeyServiceUnavailable(format!(
                "HTTP {status}: {body}"
            )));
        }

        let body: KasPublicKeyResponse = response.json().await.map_err(|e| {
            NanoTdfError::KeyServiceUnavailable(format!("invalid public key response: {e}"))
        })?;

        KasPublicKey::from_pem(self.locator.clone(), &body.public_key, body.kid)
    }
}
