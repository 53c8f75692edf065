//! Endpoint registry: hashed indirection from opaque tokens to upstream URLs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;
use zk_gateway_common::{Error, Result};

use crate::models::{hash_endpoint, EndpointMapping, RegistrationStats};
use crate::storage::EndpointStore;

/// Result of registering a batch of URLs for one organization
#[derive(Debug, Clone, Default)]
pub struct RegistrationOutcome {
    /// url → hash, for every accepted URL (new and existing)
    pub hashes: BTreeMap<String, String>,
    pub stats: RegistrationStats,
    /// URLs that failed validation and were skipped
    pub rejected: Vec<String>,
}

/// Registry of endpoint mappings over an injected store.
///
/// Writes (registration, reset) are serialized by an internal lock so that
/// concurrent registrations never lose each other's mappings. Lookups go
/// straight to the store.
pub struct EndpointRegistry {
    store: Arc<dyn EndpointStore>,
    write_lock: Mutex<()>,
}

impl EndpointRegistry {
    pub fn new(store: Arc<dyn EndpointStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Whether `url` is an absolute http(s) URL with a host
    pub fn validate(url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => {
                matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
            }
            Err(_) => false,
        }
    }

    /// Register a single URL, returning its hash. Idempotent.
    pub async fn register(&self, url: &str, organization_id: &str) -> Result<String> {
        let url = url.trim();
        if !Self::validate(url) {
            return Err(Error::InvalidUrl(url.to_string()));
        }

        let outcome = self.register_batch(organization_id, &[url.to_string()]).await?;
        outcome
            .hashes
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("no hash recorded for {}", url)))
    }

    /// Register many URLs for an organization.
    ///
    /// Invalid URLs are skipped and reported; duplicates within the batch count
    /// once. Already-registered pairs keep their existing hash. All new
    /// mappings are written in one store call, and a hash collision aborts the
    /// whole batch before anything is written.
    pub async fn register_batch(
        &self,
        organization_id: &str,
        urls: &[String],
    ) -> Result<RegistrationOutcome> {
        let organization_id = organization_id.trim();
        if organization_id.is_empty() {
            return Err(Error::MissingOrganization);
        }

        let mut outcome = RegistrationOutcome::default();
        let mut valid = Vec::new();
        let mut seen = HashSet::new();
        for url in urls {
            let url = url.trim();
            if !Self::validate(url) {
                warn!("Invalid endpoint URL: {}", url);
                outcome.rejected.push(url.to_string());
                continue;
            }
            if seen.insert(url.to_string()) {
                valid.push(url.to_string());
            }
        }

        if valid.is_empty() {
            return Err(Error::NoValidEndpoints);
        }

        let _guard = self.write_lock.lock().await;

        let mut pending: HashMap<String, EndpointMapping> = HashMap::new();
        for url in &valid {
            let hash = hash_endpoint(url, organization_id);

            if let Some(existing) = self.store.get(&hash).await? {
                if !existing.matches(url, organization_id) {
                    return Err(collision(&hash, &existing));
                }
                outcome.hashes.insert(url.clone(), existing.hash);
                outcome.stats.existing += 1;
                continue;
            }

            if let Some(other) = pending.get(&hash) {
                return Err(collision(&hash, other));
            }

            outcome.hashes.insert(url.clone(), hash.clone());
            pending.insert(
                hash,
                EndpointMapping::new(url.clone(), organization_id.to_string()),
            );
        }

        outcome.stats.total = valid.len();
        outcome.stats.new = pending.len();

        if !pending.is_empty() {
            let mut new_mappings: Vec<EndpointMapping> = pending.into_values().collect();
            new_mappings.sort_by(|a, b| a.original_url.cmp(&b.original_url));
            self.store.put(new_mappings).await?;
        }

        info!(
            "Endpoints uploaded for organization: {} (valid: {}, new: {}, existing: {}, rejected: {})",
            organization_id,
            outcome.stats.total,
            outcome.stats.new,
            outcome.stats.existing,
            outcome.rejected.len()
        );

        Ok(outcome)
    }

    /// Resolve a hash to its mapping.
    ///
    /// A storage fault is logged and reported as not found.
    pub async fn resolve(&self, hash: &str) -> Option<EndpointMapping> {
        match self.store.get(hash).await {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!("Endpoint lookup failed, treating as unknown: {}", e);
                None
            }
        }
    }

    /// All mappings belonging to an organization, oldest first
    pub async fn list_for_organization(&self, organization_id: &str) -> Vec<EndpointMapping> {
        let mut mappings: Vec<EndpointMapping> = self
            .list_all()
            .await
            .into_iter()
            .filter(|m| m.organization_id == organization_id)
            .collect();
        mappings.sort_by_key(|m| m.created_at);
        mappings
    }

    /// Every mapping in the registry. A storage fault yields an empty list.
    pub async fn list_all(&self) -> Vec<EndpointMapping> {
        match self.store.list().await {
            Ok(mappings) => mappings,
            Err(e) => {
                warn!("Failed to load endpoint mappings, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Administrative reset of the whole registry
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.clear().await?;
        info!("All endpoint mappings cleared");
        Ok(())
    }
}

fn collision(hash: &str, existing: &EndpointMapping) -> Error {
    tracing::error!(
        "Endpoint hash collision on {}: already mapped for organization {}",
        hash,
        existing.organization_id
    );
    Error::HashCollision {
        hash: hash.to_string(),
        existing_url: existing.original_url.clone(),
        existing_org: existing.organization_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileEndpointStore;
    use chrono::Utc;

    async fn registry_in(dir: &tempfile::TempDir) -> EndpointRegistry {
        let store = FileEndpointStore::open(dir.path().join("endpoints.json"))
            .await
            .unwrap();
        EndpointRegistry::new(Arc::new(store))
    }

    #[test]
    fn test_validate() {
        assert!(EndpointRegistry::validate("https://api.example.com/data"));
        assert!(EndpointRegistry::validate("http://localhost:3000/echo"));
        assert!(!EndpointRegistry::validate("not a url"));
        assert!(!EndpointRegistry::validate("/relative/path"));
        assert!(!EndpointRegistry::validate("ftp://files.example.com"));
        assert!(!EndpointRegistry::validate(""));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        let first = registry
            .register("https://api.example.com/data", "acme")
            .await
            .unwrap();
        let second = registry
            .register("https://api.example.com/data", "acme")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        for url in ["https://api.example.com/data", "http://127.0.0.1:8080/x?y=1"] {
            let hash = registry.register(url, "acme").await.unwrap();
            let mapping = registry.resolve(&hash).await.expect("hash not found");
            assert_eq!(mapping.original_url, url);
            assert_eq!(mapping.organization_id, "acme");
        }

        assert!(registry.resolve("0000000000000000").await.is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        let err = registry.register("not-a-url", "acme").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert!(registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_stats_and_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        registry
            .register("https://api.example.com/a", "acme")
            .await
            .unwrap();

        let urls = vec![
            "https://api.example.com/a".to_string(),
            "https://api.example.com/b".to_string(),
            "https://api.example.com/b".to_string(),
            "bogus".to_string(),
        ];
        let outcome = registry.register_batch("acme", &urls).await.unwrap();

        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.new, 1);
        assert_eq!(outcome.stats.existing, 1);
        assert_eq!(outcome.rejected, vec!["bogus".to_string()]);
        assert_eq!(outcome.hashes.len(), 2);
        assert_eq!(registry.list_all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_with_no_valid_urls_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        let err = registry
            .register_batch("acme", &["nope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoValidEndpoints));
        assert!(registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_organization() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        let err = registry
            .register_batch("  ", &["https://a.test".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingOrganization));
    }

    #[tokio::test]
    async fn test_same_url_different_orgs_get_distinct_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        let acme = registry.register("https://a.test/x", "acme").await.unwrap();
        let globex = registry.register("https://a.test/x", "globex").await.unwrap();
        assert_ne!(acme, globex);

        assert_eq!(registry.list_for_organization("acme").await.len(), 1);
        assert_eq!(registry.list_for_organization("globex").await.len(), 1);
        assert!(registry.list_for_organization("initech").await.is_empty());
    }

    #[tokio::test]
    async fn test_collision_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            FileEndpointStore::open(dir.path().join("endpoints.json"))
                .await
                .unwrap(),
        );

        // Plant a foreign mapping under the hash the next registration will compute
        let hash = hash_endpoint("https://a.test/x", "acme");
        store
            .put(vec![EndpointMapping {
                hash: hash.clone(),
                original_url: "https://evil.test".to_string(),
                organization_id: "mallory".to_string(),
                created_at: Utc::now(),
            }])
            .await
            .unwrap();

        let registry = EndpointRegistry::new(store);
        let err = registry.register("https://a.test/x", "acme").await.unwrap_err();
        assert!(matches!(err, Error::HashCollision { .. }));

        let mapping = registry.resolve(&hash).await.unwrap();
        assert_eq!(mapping.original_url, "https://evil.test");
        assert_eq!(registry.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_registrations_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(registry_in(&dir).await);

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .register(&format!("https://api.example.com/{}", i), "acme")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(registry.list_for_organization("acme").await.len(), 16);

        // Survives a reopen
        let reopened = registry_in(&dir).await;
        assert_eq!(reopened.list_all().await.len(), 16);
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_in(&dir).await;

        let hash = registry.register("https://a.test", "acme").await.unwrap();
        registry.clear().await.unwrap();

        assert!(registry.resolve(&hash).await.is_none());
        assert!(registry.list_all().await.is_empty());
    }
}
