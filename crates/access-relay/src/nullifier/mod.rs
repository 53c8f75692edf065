//! Replay prevention: the durable set of consumed nullifiers
//!
//! Consumption is a single atomic operation. A separate "contains?" followed
//! by "insert" would let two concurrent requests carrying the same nullifier
//! both see it as fresh; every backend here decides and records in one step.

mod file_store;
mod redis_store;

pub use file_store::FileNullifierStore;
pub use redis_store::RedisNullifierStore;

use async_trait::async_trait;
use zk_gateway_common::{Nullifier, Result};

/// Outcome of a consume attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// First use; the nullifier is now durably recorded
    Consumed,
    /// Seen before; the request is a replay
    AlreadyConsumed,
}

/// Durable set of consumed nullifiers
#[async_trait]
pub trait NullifierStore: Send + Sync {
    /// Atomically record the nullifier if it is new.
    ///
    /// For any nullifier at most one caller ever receives
    /// [`ConsumeOutcome::Consumed`], and only after the record is durable.
    /// An `Err` means the outcome is unknown and the request must be refused.
    async fn try_consume(&self, nullifier: &Nullifier) -> Result<ConsumeOutcome>;

    async fn is_consumed(&self, nullifier: &Nullifier) -> Result<bool>;

    /// Number of consumed nullifiers
    async fn len(&self) -> Result<usize>;
}
