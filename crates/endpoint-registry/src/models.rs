//! Data models for the Endpoint Registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest
pub const ENDPOINT_HASH_LEN: usize = 16;

/// Mapping from an opaque endpoint hash to the real upstream URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMapping {
    /// Truncated digest of `"url:organizationId"`
    pub hash: String,

    /// Upstream URL the hash stands in for
    pub original_url: String,

    /// Organization that registered the endpoint
    pub organization_id: String,

    /// When this mapping was created
    pub created_at: DateTime<Utc>,
}

impl EndpointMapping {
    /// Create a new mapping, deriving its hash
    pub fn new(original_url: String, organization_id: String) -> Self {
        Self {
            hash: hash_endpoint(&original_url, &organization_id),
            original_url,
            organization_id,
            created_at: Utc::now(),
        }
    }

    /// Whether this mapping is for the given (url, organization) pair
    pub fn matches(&self, url: &str, organization_id: &str) -> bool {
        self.original_url == url && self.organization_id == organization_id
    }
}

/// Hash an endpoint URL into its privacy-preserving identifier
pub fn hash_endpoint(url: &str, organization_id: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", url, organization_id).as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(ENDPOINT_HASH_LEN);
    hash
}

/// Counts reported back from a batch registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationStats {
    pub total: usize,
    pub new: usize,
    pub existing: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_and_truncated() {
        let a = hash_endpoint("https://api.example.com/data", "acme");
        let b = hash_endpoint("https://api.example.com/data", "acme");
        assert_eq!(a, b);
        assert_eq!(a.len(), ENDPOINT_HASH_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_depends_on_organization() {
        let acme = hash_endpoint("https://api.example.com/data", "acme");
        let globex = hash_endpoint("https://api.example.com/data", "globex");
        assert_ne!(acme, globex);
    }

    #[test]
    fn test_hash_matches_sha256_prefix() {
        let full = hex::encode(Sha256::digest(b"a:b"));
        assert_eq!(hash_endpoint("a", "b"), full[..16]);
    }

    #[test]
    fn test_mapping_serializes_camel_case() {
        let mapping = EndpointMapping::new("https://x.test".into(), "org".into());
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["originalUrl"], "https://x.test");
        assert_eq!(json["organizationId"], "org");
        assert!(json["createdAt"].is_string());
    }
}
