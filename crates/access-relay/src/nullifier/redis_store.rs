//! Redis backend
//!
//! All consumed nullifiers live in one Redis set. `SADD` reports whether the
//! member was added, which makes check-and-record a single atomic command.
//! No TTL is applied: consumed nullifiers never expire.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;
use zk_gateway_common::{Nullifier, Result};

use super::{ConsumeOutcome, NullifierStore};

const CONSUMED_SET_KEY: &str = "nullifiers:consumed";

/// Nullifier store with Redis backend
pub struct RedisNullifierStore {
    conn: ConnectionManager,
}

impl RedisNullifierStore {
    /// Create a new nullifier store
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        info!("Nullifier store connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }
}

#[async_trait]
impl NullifierStore for RedisNullifierStore {
    async fn try_consume(&self, nullifier: &Nullifier) -> Result<ConsumeOutcome> {
        let mut conn = self.conn.clone();

        // SADD returns the number of members actually added
        let added: usize = conn.sadd(CONSUMED_SET_KEY, nullifier.as_str()).await?;

        Ok(if added == 1 {
            ConsumeOutcome::Consumed
        } else {
            ConsumeOutcome::AlreadyConsumed
        })
    }

    async fn is_consumed(&self, nullifier: &Nullifier) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(CONSUMED_SET_KEY, nullifier.as_str()).await?)
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(CONSUMED_SET_KEY).await?)
    }
}
