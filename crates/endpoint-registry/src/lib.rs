//! Endpoint Registry
//!
//! Maps opaque endpoint hashes to upstream URLs scoped to an organization, so
//! the client-facing protocol never carries a plaintext upstream address.
//! Used by the access relay to resolve `endpointHash` before dispatch.

pub mod handlers;
pub mod models;
pub mod registry;
pub mod storage;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use handlers::{AppState, ADMIN_TOKEN_HEADER};
pub use models::{hash_endpoint, EndpointMapping, RegistrationStats};
pub use registry::{EndpointRegistry, RegistrationOutcome};
pub use storage::{EndpointStore, FileEndpointStore, RedisEndpointStore};

/// Create the administrative router, mounted under `/v1/endpoints`
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route(
            "/v1/endpoints/upload",
            post(handlers::upload_endpoints_handler),
        )
        .route(
            "/v1/endpoints/mappings/{organization_id}",
            get(handlers::list_mappings_handler),
        )
        .route(
            "/v1/endpoints/resolve/{hash}",
            get(handlers::resolve_handler),
        )
        .route("/v1/endpoints/all", get(handlers::list_all_handler))
        .route("/v1/endpoints/clear", delete(handlers::clear_handler))
        .with_state(shared_state)
}
