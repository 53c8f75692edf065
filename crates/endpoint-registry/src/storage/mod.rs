//! Storage backends for endpoint mappings
//!
//! The registry never touches storage directly; it is handed an
//! [`EndpointStore`] at construction so the file backend, the Redis backend
//! and test doubles are interchangeable.

mod file_store;
mod redis_store;

pub use file_store::FileEndpointStore;
pub use redis_store::RedisEndpointStore;

use crate::models::EndpointMapping;
use async_trait::async_trait;
use zk_gateway_common::Result;

/// Durable, append-only store of endpoint mappings
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Look up a mapping by hash
    async fn get(&self, hash: &str) -> Result<Option<EndpointMapping>>;

    /// Persist new mappings in a single write. Callers serialize writes and
    /// guarantee the hashes are not already present.
    async fn put(&self, mappings: Vec<EndpointMapping>) -> Result<()>;

    /// All mappings in insertion order
    async fn list(&self) -> Result<Vec<EndpointMapping>>;

    /// Remove every mapping
    async fn clear(&self) -> Result<()>;
}
