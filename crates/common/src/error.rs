use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Missing organization id")]
    MissingOrganization,

    #[error("No valid endpoints provided")]
    NoValidEndpoints,

    #[error("Endpoint hash collision on {hash}: already mapped to {existing_url} for {existing_org}")]
    HashCollision {
        hash: String,
        existing_url: String,
        existing_org: String,
    },

    #[error("Malformed public signals: {0}")]
    MalformedSignals(String),

    #[error("Unsupported signal schema version: {0}")]
    UnsupportedSchema(u32),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
