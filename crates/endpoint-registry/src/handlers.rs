//! Administrative API handlers for the Endpoint Registry
//!
//! These routes are kept off the authorization path. When an admin token is
//! configured every route requires it in the `x-admin-token` header;
//! `resolve`, `all` and `clear` are refused outright without one, since they
//! expose or destroy the hash → URL indirection.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use zk_gateway_common::Error;

use crate::models::{EndpointMapping, RegistrationStats};
use crate::registry::EndpointRegistry;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Shared application state
pub struct AppState {
    pub registry: Arc<EndpointRegistry>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(registry: Arc<EndpointRegistry>, admin_token: Option<String>) -> Self {
        Self {
            registry,
            admin_token,
        }
    }

    fn authorize(&self, headers: &HeaderMap, privileged: bool) -> Result<(), ApiError> {
        let Some(expected) = self.admin_token.as_deref() else {
            if privileged {
                warn!("Refusing privileged registry operation: no admin token configured");
                return Err(ApiError::new(
                    StatusCode::FORBIDDEN,
                    "Operation disabled: no admin token configured",
                ));
            }
            return Ok(());
        };

        let presented = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            warn!("Rejected registry request with invalid admin token");
            Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "Invalid or missing admin token",
            ))
        }
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidUrl(_) | Error::NoValidEndpoints | Error::MissingOrganization => {
                StatusCode::BAD_REQUEST
            }
            Error::HashCollision { .. } => StatusCode::CONFLICT,
            _ => {
                error!("Endpoint registry error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError::new(status, err.to_string())
    }
}

/// Request to upload endpoints for an organization
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEndpointsRequest {
    pub organization_id: Option<String>,
    pub endpoints: Option<Vec<String>>,
}

/// Response from an upload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEndpointsResponse {
    pub success: bool,
    pub organization_id: String,
    pub hashed_endpoints: BTreeMap<String, String>,
    pub stats: RegistrationStats,
    pub rejected: Vec<String>,
}

/// Mappings for one organization
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingsResponse {
    pub success: bool,
    pub organization_id: String,
    pub mappings: Vec<EndpointMapping>,
    pub count: usize,
}

/// Internal hash lookup
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub success: bool,
    pub hash: String,
    pub original_url: String,
    pub organization_id: String,
}

/// Full registry listing
#[derive(Debug, Serialize)]
pub struct AllMappingsResponse {
    pub success: bool,
    pub mappings: Vec<EndpointMapping>,
    pub count: usize,
}

/// Upload endpoints and get their hashed identifiers
pub async fn upload_endpoints_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UploadEndpointsRequest>,
) -> Result<Json<UploadEndpointsResponse>, ApiError> {
    state.authorize(&headers, false)?;

    let (Some(organization_id), Some(endpoints)) = (payload.organization_id, payload.endpoints)
    else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Missing required fields: organizationId and endpoints array",
        ));
    };

    let outcome = state
        .registry
        .register_batch(&organization_id, &endpoints)
        .await?;

    Ok(Json(UploadEndpointsResponse {
        success: true,
        organization_id: organization_id.trim().to_string(),
        hashed_endpoints: outcome.hashes,
        stats: outcome.stats,
        rejected: outcome.rejected,
    }))
}

/// Get endpoint mappings for an organization
pub async fn list_mappings_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(organization_id): Path<String>,
) -> Result<Json<MappingsResponse>, ApiError> {
    state.authorize(&headers, false)?;

    let mappings = state.registry.list_for_organization(&organization_id).await;
    let count = mappings.len();

    Ok(Json(MappingsResponse {
        success: true,
        organization_id,
        mappings,
        count,
    }))
}

/// Resolve a hash to its original URL (internal use)
pub async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(hash): Path<String>,
) -> Result<Json<ResolveResponse>, ApiError> {
    state.authorize(&headers, true)?;

    let mapping = state
        .registry
        .resolve(&hash)
        .await
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Hash not found"))?;

    Ok(Json(ResolveResponse {
        success: true,
        hash: mapping.hash,
        original_url: mapping.original_url,
        organization_id: mapping.organization_id,
    }))
}

/// List every mapping
pub async fn list_all_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AllMappingsResponse>, ApiError> {
    state.authorize(&headers, true)?;

    let mappings = state.registry.list_all().await;
    let count = mappings.len();

    Ok(Json(AllMappingsResponse {
        success: true,
        mappings,
        count,
    }))
}

/// Clear all mappings
pub async fn clear_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers, true)?;

    state.registry.clear().await?;
    info!("Endpoint registry cleared via admin API");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "All mappings cleared"
    })))
}
