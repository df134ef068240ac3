//! Platform authorization service client
//!
//! Sends an entity chain to `GetEntitlements` (authorization v2, Connect JSON
//! over HTTP) and reads back the attribute values each entity holds. The
//! subject mappings themselves never leave the platform.
//!
//! ```text
//! POST {platform}/authorization.v2.AuthorizationService/GetEntitlements
//! {"entityIdentifier": {"entityChain": {"entities": [
//!     {"ephemeralId": "user-bob", "emailAddress": "bob@OrgA.com"}]}}}
//!
//! {"entitlements": [{"ephemeralId": "user-bob",
//!     "actionsPerAttributeValueFqn": {"https://.../value/secret": {"actions": [...]}}}]}
//! ```

use crate::config::{Credentials, PlatformConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::entitlements::{EntitlementSource, EntityChain, EntityClaim};
use crate::error::NanoTdfError;
use async_trait::async_trait;
use opentdf_nano_protocol::Attribute;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, warn};

/// Path of the entitlements RPC below the platform endpoint
pub const GET_ENTITLEMENTS_PATH: &str = "/authorization.v2.AuthorizationService/GetEntitlements";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetEntitlementsRequest<'a> {
    entity_identifier: EntityIdentifier<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntityIdentifier<'a> {
    entity_chain: WireChain<'a>,
}

#[derive(Serialize)]
struct WireChain<'a> {
    entities: Vec<WireEntity<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEntity<'a> {
    ephemeral_id: &'a str,
    #[serde(flatten)]
    claim: &'a EntityClaim,
}

impl<'a> GetEntitlementsRequest<'a> {
    fn new(chain: &'a EntityChain) -> Self {
        let entities = chain
            .entities()
            .iter()
            .map(|entity| WireEntity {
                ephemeral_id: &entity.ephemeral_id,
                claim: &entity.claim,
            })
            .collect();
        Self {
            entity_identifier: EntityIdentifier {
                entity_chain: WireChain { entities },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetEntitlementsResponse {
    #[serde(default)]
    entitlements: Vec<EntityEntitlements>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityEntitlements {
    #[serde(default)]
    ephemeral_id: String,
    #[serde(default)]
    actions_per_attribute_value_fqn: BTreeMap<String, ActionList>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionList {
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct Action {
    #[serde(default)]
    name: String,
}

/// Client for the platform's authorization service
pub struct AuthorizationClient {
    http_client: Client,
    endpoint: String,
    credentials: Credentials,
}

impl AuthorizationClient {
    pub fn new(
        platform_endpoint: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, NanoTdfError> {
        Self::with_request_timeout(platform_endpoint, credentials, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Client whose HTTP requests give up after `timeout`
    pub fn with_request_timeout(
        platform_endpoint: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, NanoTdfError> {
        let base = platform_endpoint.into().trim().trim_end_matches('/').to_string();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(NanoTdfError::Config(format!(
                "platform endpoint '{base}' must start with http:// or https://"
            )));
        }
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NanoTdfError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            endpoint: format!("{base}{GET_ENTITLEMENTS_PATH}"),
            credentials,
        })
    }

    pub fn from_config(config: &PlatformConfig) -> Result<Self, NanoTdfError> {
        Self::with_request_timeout(
            &config.platform_endpoint,
            config.credentials.clone(),
            config.request_timeout,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EntitlementSource for AuthorizationClient {
    async fn entitlements(
        &self,
        chain: &EntityChain,
    ) -> Result<BTreeMap<String, BTreeSet<Attribute>>, NanoTdfError> {
        debug!(endpoint = %self.endpoint, entities = chain.len(), "requesting entitlements");

        let request = self
            .http_client
            .post(&self.endpoint)
            .header("Connect-Protocol-Version", "1")
            .json(&GetEntitlementsRequest::new(chain));
        let response = self
            .credentials
            .authorize(request)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, error = %e, "authorization service unreachable");
                NanoTdfError::ResolutionUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NanoTdfError::ResolutionUnavailable(format!(
                "HTTP {status}: {body}"
            )));
        }

        let body: GetEntitlementsResponse = response.json().await.map_err(|e| {
            NanoTdfError::ResolutionUnavailable(format!("invalid entitlements response: {e}"))
        })?;
        collect(chain, body)
    }
}

/// Key the response by the chain's ephemeral ids
///
/// Entries without an ephemeral id are matched to the chain by position.
/// Entities the service does not mention hold nothing.
fn collect(
    chain: &EntityChain,
    response: GetEntitlementsResponse,
) -> Result<BTreeMap<String, BTreeSet<Attribute>>, NanoTdfError> {
    let mut by_entity: BTreeMap<String, BTreeSet<Attribute>> = chain
        .entities()
        .iter()
        .map(|entity| (entity.ephemeral_id.clone(), BTreeSet::new()))
        .collect();

    for (index, entry) in response.entitlements.into_iter().enumerate() {
        let ephemeral_id = if entry.ephemeral_id.is_empty() {
            match chain.entities().get(index) {
                Some(entity) => entity.ephemeral_id.clone(),
                None => continue,
            }
        } else {
            entry.ephemeral_id
        };
        let Some(held) = by_entity.get_mut(&ephemeral_id) else {
            debug!(%ephemeral_id, "ignoring entitlements for entity outside the chain");
            continue;
        };
        for (fqn, actions) in entry.actions_per_attribute_value_fqn {
            debug!(
                %fqn,
                actions = ?actions.actions.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                "entitled"
            );
            held.insert(Attribute::parse(&fqn)?);
        }
    }
    Ok(by_entity)
}
