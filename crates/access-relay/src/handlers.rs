use axum::{
    body::Bytes,
    extract::State,
    http::Method,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::RelayError;
use crate::models::RelayRequest;
use crate::relay::AccessRelay;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub success: bool,
    pub request_id: String,
    pub data: Value,
}

/// Proof-gated access: accepts any method
///
/// The pipeline runs in its own task so a client disconnect cannot abandon
/// a request between consuming its nullifier and writing the access log.
pub async fn access_handler(
    State(relay): State<Arc<AccessRelay>>,
    method: Method,
    body: Bytes,
) -> Response {
    let request: RelayRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return RelayError::InvalidRequest(e.to_string()).into_response(),
    };

    let outcome = tokio::spawn(async move { relay.authorize(request, method).await }).await;

    match outcome {
        Ok(Ok(success)) => Json(AccessResponse {
            success: true,
            request_id: success.request_id.to_string(),
            data: success.data,
        })
        .into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            tracing::error!("Access task failed: {}", e);
            RelayError::Internal("request processing failed".to_string()).into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
