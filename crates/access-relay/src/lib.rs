//! Access Relay
//!
//! HTTP service that admits a request only on presentation of a valid
//! zero-knowledge proof, consumes the proof's nullifier exactly once, and
//! forwards the request to an upstream identified by an opaque endpoint hash.
//!
//! ## Endpoints
//!
//! - `ANY /v1/access` - Proof-gated relay
//! - `/v1/endpoints/*` - Endpoint registry administration
//! - `GET /circuits/*` - Circuit artifacts, when configured
//! - `GET /health` - Health check

pub mod allowlist;
pub mod audit;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod models;
pub mod nullifier;
pub mod relay;
pub mod verifier;

use axum::{
    routing::{any, get},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use allowlist::Allowlist;
pub use audit::{AccessLog, AccessLogEntry, AccessOutcome};
pub use config::{Config, StorageBackend};
pub use dispatch::Dispatcher;
pub use error::RelayError;
pub use models::{RelayPayload, RelayRequest};
pub use nullifier::{ConsumeOutcome, FileNullifierStore, NullifierStore, RedisNullifierStore};
pub use relay::{AccessRelay, RelaySuccess};
pub use verifier::{Groth16Verifier, ProofVerifier};

/// Create the full service router: relay, registry admin and static circuits
pub fn create_router(
    relay: Arc<AccessRelay>,
    registry_state: endpoint_registry::AppState,
    circuits_dir: Option<PathBuf>,
) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/v1/access", any(handlers::access_handler))
        .with_state(relay)
        .merge(endpoint_registry::create_router(registry_state));

    if let Some(dir) = circuits_dir {
        router = router.nest_service("/circuits", ServeDir::new(dir));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
