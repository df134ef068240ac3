//! Entitlement resolution
//!
//! Maps an entity chain (the requesting user plus any intermediaries, such as
//! the client application acting for them) to the attribute values each
//! entity holds. The platform's authorization service answers directly
//! ([`AuthorizationClient`](crate::authorization::AuthorizationClient)); subject
//! mappings held locally are evaluated in process.
//!
//! # Chain rule
//!
//! By default a chain only holds an attribute when every entity in it does
//! ([`ChainRule::Intersection`]): a client cannot widen what its user may
//! see, nor the reverse. [`ChainRule::Union`] is available for deployments
//! that authorize on any member of the chain.
//!
//! # Example
//!
//! ```no_run
//! use opentdf_nano::authorization::AuthorizationClient;
//! use opentdf_nano::entitlements::{Entity, EntityChain, EntitlementResolver};
//! use opentdf_nano::PlatformConfig;
//!
//! # async fn example() -> Result<(), opentdf_nano::NanoTdfError> {
//! let config = PlatformConfig::from_env()?;
//! let resolver = EntitlementResolver::new(AuthorizationClient::from_config(&config)?)
//!     .with_timeout(config.request_timeout);
//!
//! let chain = EntityChain::new(vec![Entity::email_address("user-bob", "bob@OrgA.com")]);
//! let entitlements = resolver.resolve(&chain).await?;
//! for attribute in entitlements.effective() {
//!     println!("{attribute}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::NanoTdfError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opentdf_nano_protocol::Attribute;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Time allowed for an entitlement lookup when none is configured
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// What an entity asserts about itself
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityClaim {
    EmailAddress(String),
    UserName(String),
    ClientId(String),
}

/// One member of an entity chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Request-scoped identifier, used to key the result
    pub ephemeral_id: String,
    pub claim: EntityClaim,
}

impl Entity {
    pub fn new(ephemeral_id: impl Into<String>, claim: EntityClaim) -> Self {
        Self {
            ephemeral_id: ephemeral_id.into(),
            claim,
        }
    }

    pub fn email_address(ephemeral_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(ephemeral_id, EntityClaim::EmailAddress(email.into()))
    }

    pub fn user_name(ephemeral_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ephemeral_id, EntityClaim::UserName(name.into()))
    }

    pub fn client_id(ephemeral_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self::new(ephemeral_id, EntityClaim::ClientId(client_id.into()))
    }
}

/// Ordered chain of entities behind one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityChain {
    entities: Vec<Entity>,
}

impl EntityChain {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn validate(&self) -> Result<(), NanoTdfError> {
        if self.entities.is_empty() {
            return Err(NanoTdfError::InvalidEntityChain(
                "chain has no entities".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for entity in &self.entities {
            if entity.ephemeral_id.trim().is_empty() {
                return Err(NanoTdfError::InvalidEntityChain(
                    "entity has an empty ephemeral id".to_string(),
                ));
            }
            if !seen.insert(entity.ephemeral_id.as_str()) {
                return Err(NanoTdfError::InvalidEntityChain(format!(
                    "duplicate ephemeral id '{}'",
                    entity.ephemeral_id
                )));
            }
        }
        Ok(())
    }
}

/// Condition an entity must meet for a subject mapping to apply
///
/// Email addresses, email domains and user names compare case-insensitively;
/// client ids compare exactly. An empty `anyOf`/`allOf` never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectCondition {
    EmailDomain(String),
    EmailAddress(String),
    UserName(String),
    ClientId(String),
    AnyOf(Vec<SubjectCondition>),
    AllOf(Vec<SubjectCondition>),
}

impl SubjectCondition {
    pub fn matches(&self, claim: &EntityClaim) -> bool {
        match (self, claim) {
            (SubjectCondition::EmailDomain(domain), EntityClaim::EmailAddress(email)) => email
                .rsplit_once('@')
                .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain)),
            (SubjectCondition::EmailAddress(expected), EntityClaim::EmailAddress(email)) => {
                email.eq_ignore_ascii_case(expected)
            }
            (SubjectCondition::UserName(expected), EntityClaim::UserName(name)) => {
                name.eq_ignore_ascii_case(expected)
            }
            (SubjectCondition::ClientId(expected), EntityClaim::ClientId(id)) => id == expected,
            (SubjectCondition::AnyOf(conditions), _) => conditions.iter().any(|c| c.matches(claim)),
            (SubjectCondition::AllOf(conditions), _) => {
                !conditions.is_empty() && conditions.iter().all(|c| c.matches(claim))
            }
            _ => false,
        }
    }
}

/// Grants `attribute` to entities that meet `condition`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMapping {
    pub attribute: Attribute,
    pub condition: SubjectCondition,
}

impl SubjectMapping {
    pub fn new(attribute: Attribute, condition: SubjectCondition) -> Self {
        Self {
            attribute,
            condition,
        }
    }
}

/// How per-entity entitlements combine into the chain's entitlements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainRule {
    /// The chain holds an attribute only when every entity holds it
    #[default]
    Intersection,
    /// The chain holds an attribute when any entity holds it
    Union,
}

/// Resolved entitlements for one entity chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlements {
    by_entity: BTreeMap<String, BTreeSet<Attribute>>,
    resolved_at: DateTime<Utc>,
    rule: ChainRule,
}

impl Entitlements {
    pub fn new(by_entity: BTreeMap<String, BTreeSet<Attribute>>, rule: ChainRule) -> Self {
        Self::new_at(by_entity, rule, Utc::now())
    }

    pub fn new_at(
        by_entity: BTreeMap<String, BTreeSet<Attribute>>,
        rule: ChainRule,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            by_entity,
            resolved_at,
            rule,
        }
    }

    /// Attributes held by one entity of the chain
    pub fn for_entity(&self, ephemeral_id: &str) -> Option<&BTreeSet<Attribute>> {
        self.by_entity.get(ephemeral_id)
    }

    pub fn by_entity(&self) -> &BTreeMap<String, BTreeSet<Attribute>> {
        &self.by_entity
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    pub fn rule(&self) -> ChainRule {
        self.rule
    }

    /// Attributes the chain as a whole holds under its chain rule
    pub fn effective(&self) -> BTreeSet<Attribute> {
        let mut sets = self.by_entity.values();
        match self.rule {
            ChainRule::Union => sets.flatten().cloned().collect(),
            ChainRule::Intersection => {
                let Some(first) = sets.next() else {
                    return BTreeSet::new();
                };
                sets.fold(first.clone(), |acc, set| {
                    acc.intersection(set).cloned().collect()
                })
            }
        }
    }
}

/// Source of subject mappings
#[async_trait]
pub trait SubjectMappingStore: Send + Sync {
    async fn subject_mappings(&self) -> Result<Vec<SubjectMapping>, NanoTdfError>;
}

/// Subject mappings held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySubjectMappings {
    mappings: Vec<SubjectMapping>,
}

impl InMemorySubjectMappings {
    pub fn new(mappings: Vec<SubjectMapping>) -> Self {
        Self { mappings }
    }

    #[must_use]
    pub fn with(mut self, mapping: SubjectMapping) -> Self {
        self.mappings.push(mapping);
        self
    }
}

#[async_trait]
impl SubjectMappingStore for InMemorySubjectMappings {
    async fn subject_mappings(&self) -> Result<Vec<SubjectMapping>, NanoTdfError> {
        Ok(self.mappings.clone())
    }
}

/// Anything that can say which attributes each entity of a chain holds
///
/// Implemented for every [`SubjectMappingStore`] by evaluating its mappings
/// locally, and by [`AuthorizationClient`](crate::authorization::AuthorizationClient),
/// which asks the platform's authorization service.
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    /// Attributes held by each entity, keyed by ephemeral id
    ///
    /// Every entity of `chain` gets an entry, empty when it holds nothing.
    async fn entitlements(
        &self,
        chain: &EntityChain,
    ) -> Result<BTreeMap<String, BTreeSet<Attribute>>, NanoTdfError>;
}

#[async_trait]
impl<T: SubjectMappingStore> EntitlementSource for T {
    async fn entitlements(
        &self,
        chain: &EntityChain,
    ) -> Result<BTreeMap<String, BTreeSet<Attribute>>, NanoTdfError> {
        let mappings = self.subject_mappings().await?;
        debug!(mappings = mappings.len(), "evaluating subject mappings");
        Ok(evaluate(&mappings, chain))
    }
}

fn evaluate(
    mappings: &[SubjectMapping],
    chain: &EntityChain,
) -> BTreeMap<String, BTreeSet<Attribute>> {
    chain
        .entities()
        .iter()
        .map(|entity| {
            let held = mappings
                .iter()
                .filter(|m| m.condition.matches(&entity.claim))
                .map(|m| m.attribute.clone())
                .collect();
            (entity.ephemeral_id.clone(), held)
        })
        .collect()
}

/// Cache of resolved entitlements with a fixed time-to-live
///
/// Entries expire `ttl` after they were resolved; a TTL too large to add to
/// the resolution time never yields a fresh entry. Stale entries are dropped
/// on lookup and on every insert. The cache cannot see changes at the policy
/// authority; call [`invalidate_all`](Self::invalidate_all) whenever the
/// authority signals one.
#[derive(Debug)]
pub struct EntitlementCache {
    ttl: chrono::Duration,
    entries: RwLock<HashMap<EntityChain, Entitlements>>,
}

impl EntitlementCache {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    fn is_fresh(&self, entitlements: &Entitlements, now: DateTime<Utc>) -> bool {
        entitlements
            .resolved_at()
            .checked_add_signed(self.ttl)
            .is_some_and(|expires| now < expires)
    }

    /// Unexpired entitlements for `chain`
    pub async fn get(&self, chain: &EntityChain) -> Option<Entitlements> {
        self.get_at(chain, Utc::now()).await
    }

    /// Entitlements for `chain` that are still fresh at `now`
    pub async fn get_at(&self, chain: &EntityChain, now: DateTime<Utc>) -> Option<Entitlements> {
        {
            let entries = self.entries.read().await;
            match entries.get(chain) {
                None => return None,
                Some(hit) if self.is_fresh(hit, now) => return Some(hit.clone()),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(chain).is_some_and(|e| !self.is_fresh(e, now)) {
            entries.remove(chain);
        }
        None
    }

    pub async fn insert(&self, chain: EntityChain, entitlements: Entitlements) {
        self.insert_at(chain, entitlements, Utc::now()).await;
    }

    /// Insert, first dropping every entry that is stale at `now`
    pub async fn insert_at(
        &self,
        chain: EntityChain,
        entitlements: Entitlements,
        now: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| self.is_fresh(e, now));
        entries.insert(chain, entitlements);
    }

    /// Drop every entry
    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "entitlement cache invalidated");
    }

    /// Drop entries that have expired at `now`
    pub async fn purge_expired_at(&self, now: DateTime<Utc>) {
        self.entries
            .write()
            .await
            .retain(|_, e| self.is_fresh(e, now));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Resolves entity chains to entitlements
pub struct EntitlementResolver<S> {
    source: S,
    timeout: Duration,
    rule: ChainRule,
    cache: Option<EntitlementCache>,
}

impl<S: EntitlementSource> EntitlementResolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            timeout: DEFAULT_RESOLUTION_TIMEOUT,
            rule: ChainRule::default(),
            cache: None,
        }
    }

    /// Bound on each call to the entitlement source
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_chain_rule(mut self, rule: ChainRule) -> Self {
        self.rule = rule;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: EntitlementCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&EntitlementCache> {
        self.cache.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve the attributes each entity of `chain` holds
    ///
    /// A timeout or transport failure reaching the source is
    /// `ResolutionUnavailable`; it is never reported as "no entitlements".
    pub async fn resolve(&self, chain: &EntityChain) -> Result<Entitlements, NanoTdfError> {
        chain.validate()?;

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(chain).await {
                debug!(entities = chain.len(), "entitlements served from cache");
                return Ok(hit);
            }
        }

        let by_entity = match tokio::time::timeout(self.timeout, self.source.entitlements(chain))
            .await
        {
            Ok(Ok(by_entity)) => by_entity,
            Ok(Err(err)) => {
                warn!(error = %err, "entitlement lookup failed");
                return Err(err);
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "entitlement lookup timed out");
                return Err(NanoTdfError::ResolutionUnavailable(format!(
                    "policy authority did not respond within {:?}",
                    self.timeout
                )));
            }
        };

        let entitlements = Entitlements::new(by_entity, self.rule);
        info!(
            entities = chain.len(),
            effective = entitlements.effective().len(),
            rule = ?self.rule,
            "resolved entitlements"
        );

        if let Some(cache) = &self.cache {
            cache.insert(chain.clone(), entitlements.clone()).await;
        }
        Ok(entitlements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(fqn: &str) -> Attribute {
        Attribute::parse(fqn).unwrap()
    }

    fn secret() -> Attribute {
        attr("https://example.com/attr/classification/value/secret")
    }

    fn usa() -> Attribute {
        attr("https://example.com/attr/country/value/usa")
    }

    #[test]
    fn test_email_domain_case_insensitive() {
        let condition = SubjectCondition::EmailDomain("orga.com".into());
        assert!(condition.matches(&EntityClaim::EmailAddress("bob@OrgA.com".into())));
        assert!(!condition.matches(&EntityClaim::EmailAddress("bob@orgb.com".into())));
        assert!(!condition.matches(&EntityClaim::UserName("orga.com".into())));
    }

    #[test]
    fn test_composite_conditions() {
        let claim = EntityClaim::EmailAddress("alice@orga.com".into());
        let any = SubjectCondition::AnyOf(vec![
            SubjectCondition::UserName("alice".into()),
            SubjectCondition::EmailDomain("ORGA.COM".into()),
        ]);
        let all = SubjectCondition::AllOf(vec![
            SubjectCondition::EmailDomain("orga.com".into()),
            SubjectCondition::EmailAddress("bob@orga.com".into()),
        ]);
        assert!(any.matches(&claim));
        assert!(!all.matches(&claim));
        assert!(!SubjectCondition::AllOf(vec![]).matches(&claim));
        assert!(!SubjectCondition::AnyOf(vec![]).matches(&claim));
    }

    #[test]
    fn test_client_id_exact() {
        let condition = SubjectCondition::ClientId("tdf-client".into());
        assert!(condition.matches(&EntityClaim::ClientId("tdf-client".into())));
        assert!(!condition.matches(&EntityClaim::ClientId("TDF-Client".into())));
    }

    #[test]
    fn test_subject_mapping_json() {
        let mapping: SubjectMapping = serde_json::from_str(
            r#"{
                "attribute": "https://example.com/attr/classification/value/secret",
                "condition": {"emailDomain": "orga.com"}
            }"#,
        )
        .unwrap();
        assert_eq!(mapping.attribute, secret());
        assert_eq!(
            mapping.condition,
            SubjectCondition::EmailDomain("orga.com".into())
        );
    }

    #[test]
    fn test_effective_intersection_and_union() {
        let mut by_entity = BTreeMap::new();
        by_entity.insert("user".to_string(), BTreeSet::from([secret(), usa()]));
        by_entity.insert("client".to_string(), BTreeSet::from([secret()]));

        let intersection = Entitlements::new(by_entity.clone(), ChainRule::Intersection);
        assert_eq!(intersection.effective(), BTreeSet::from([secret()]));

        let union = Entitlements::new(by_entity, ChainRule::Union);
        assert_eq!(union.effective(), BTreeSet::from([secret(), usa()]));
    }

    #[test]
    fn test_effective_empty() {
        let entitlements = Entitlements::new(BTreeMap::new(), ChainRule::Intersection);
        assert!(entitlements.effective().is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_rejected() {
        let resolver = EntitlementResolver::new(InMemorySubjectMappings::default());
        let err = resolver.resolve(&EntityChain::default()).await.unwrap_err();
        assert!(matches!(err, NanoTdfError::InvalidEntityChain(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_duplicate_ephemeral_id_rejected() {
        let resolver = EntitlementResolver::new(InMemorySubjectMappings::default());
        let chain = EntityChain::new(vec![
            Entity::email_address("e1", "a@orga.com"),
            Entity::client_id("e1", "tdf-client"),
        ]);
        assert!(matches!(
            resolver.resolve(&chain).await,
            Err(NanoTdfError::InvalidEntityChain(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_expiry_and_invalidation() {
        let cache = EntitlementCache::new(chrono::Duration::seconds(60));
        let chain = EntityChain::new(vec![Entity::user_name("e1", "bob")]);
        let resolved = Utc::now();
        let entitlements = Entitlements::new_at(BTreeMap::new(), ChainRule::Union, resolved);
        cache.insert(chain.clone(), entitlements.clone()).await;

        let fresh = resolved + chrono::Duration::seconds(59);
        let stale = resolved + chrono::Duration::seconds(61);
        assert_eq!(cache.get_at(&chain, fresh).await, Some(entitlements));
        assert_eq!(cache.get_at(&chain, stale).await, None);

        assert!(cache.is_empty().await);

        cache
            .insert(chain.clone(), Entitlements::new(BTreeMap::new(), ChainRule::Union))
            .await;
        assert_eq!(cache.len().await, 1);
        cache.invalidate_all().await;
        assert!(cache.get(&chain).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_drops_stale_entries_on_insert() {
        let cache = EntitlementCache::new(chrono::Duration::seconds(1));
        let resolved = Utc::now();
        for i in 0..100 {
            let chain = EntityChain::new(vec![Entity::user_name(format!("e{i}"), "bob")]);
            let entitlements = Entitlements::new_at(BTreeMap::new(), ChainRule::Union, resolved);
            cache.insert_at(chain, entitlements, resolved).await;
        }
        assert_eq!(cache.len().await, 100);

        let later = resolved + chrono::Duration::hours(1);
        let chain = EntityChain::new(vec![Entity::user_name("fresh", "alice")]);
        let entitlements = Entitlements::new_at(BTreeMap::new(), ChainRule::Union, later);
        cache.insert_at(chain.clone(), entitlements, later).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get_at(&chain, later).await.is_some());
    }

    #[tokio::test]
    async fn test_cache_ttl_overflow_is_never_fresh() {
        let cache = EntitlementCache::new(chrono::Duration::max_value());
        let chain = EntityChain::new(vec![Entity::user_name("e1", "bob")]);
        cache
            .insert(chain.clone(), Entitlements::new(BTreeMap::new(), ChainRule::Union))
            .await;
        assert!(cache.get(&chain).await.is_none());
        cache.purge_expired_at(Utc::now()).await;
        assert!(cache.is_empty().await);
    }

}
