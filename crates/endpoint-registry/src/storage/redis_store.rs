//! Redis backend for endpoint mappings
//!
//! Data model:
//! - endpoint:{hash} → JSON-encoded EndpointMapping
//! - endpoints:all → Sorted set (score=created_at millis, member=hash)

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, warn};
use zk_gateway_common::Result;

use super::EndpointStore;
use crate::models::EndpointMapping;

const INDEX_KEY: &str = "endpoints:all";

fn mapping_key(hash: &str) -> String {
    format!("endpoint:{}", hash)
}

/// Endpoint store backed by Redis
pub struct RedisEndpointStore {
    conn: ConnectionManager,
}

impl RedisEndpointStore {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn decode(hash: &str, json: &str) -> Option<EndpointMapping> {
        match serde_json::from_str(json) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                warn!("Skipping corrupt endpoint mapping {}: {}", hash, e);
                None
            }
        }
    }
}

#[async_trait]
impl EndpointStore for RedisEndpointStore {
    async fn get(&self, hash: &str) -> Result<Option<EndpointMapping>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(mapping_key(hash)).await?;
        Ok(json.and_then(|data| Self::decode(hash, &data)))
    }

    async fn put(&self, mappings: Vec<EndpointMapping>) -> Result<()> {
        if mappings.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for mapping in &mappings {
            let json = serde_json::to_string(mapping)?;
            pipe.set(mapping_key(&mapping.hash), json)
                .ignore()
                .zadd(INDEX_KEY, &mapping.hash, mapping.created_at.timestamp_millis())
                .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<EndpointMapping>> {
        let mut conn = self.conn.clone();
        let hashes: Vec<String> = conn.zrange(INDEX_KEY, 0, -1).await?;
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = hashes.iter().map(|h| mapping_key(h)).collect();
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        Ok(hashes
            .iter()
            .zip(values)
            .filter_map(|(hash, json)| json.and_then(|data| Self::decode(hash, &data)))
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let hashes: Vec<String> = conn.zrange(INDEX_KEY, 0, -1).await?;

        let mut keys: Vec<String> = hashes.iter().map(|h| mapping_key(h)).collect();
        keys.push(INDEX_KEY.to_string());
        let _: () = conn.del(&keys).await?;

        info!("Cleared {} endpoint mappings from Redis", hashes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_store() -> RedisEndpointStore {
        RedisEndpointStore::new("redis://127.0.0.1:6379/15")
            .await
            .expect("Failed to connect to test Redis")
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_put_get_list_clear() {
        let store = get_test_store().await;
        store.clear().await.unwrap();

        let first = EndpointMapping::new("https://api.example.com/a".into(), "acme".into());
        let second = EndpointMapping::new("https://api.example.com/b".into(), "acme".into());
        store.put(vec![first.clone(), second.clone()]).await.unwrap();

        let fetched = store.get(&first.hash).await.unwrap().expect("mapping not found");
        assert_eq!(fetched.original_url, "https://api.example.com/a");

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);

        store.clear().await.unwrap();
        assert!(store.get(&first.hash).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }
}
