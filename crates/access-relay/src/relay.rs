//! The access pipeline
//!
//! verify proof -> extract signals -> resolve endpoint -> allowlist ->
//! consume nullifier -> dispatch -> access log.
//!
//! Every check that can reject a request runs before the nullifier is
//! consumed, so a rejected request never burns its nullifier. Once consumed
//! the nullifier stays consumed, whatever the upstream does. Refusals after
//! signal extraction are recorded in the access log as `rejected`.

use axum::http::Method;
use endpoint_registry::EndpointRegistry;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use zk_gateway_common::{AccessSignals, SignalSchema};

use crate::allowlist::Allowlist;
use crate::audit::{AccessLog, AccessLogEntry, AccessOutcome};
use crate::dispatch::{DispatchRequest, Dispatcher};
use crate::error::RelayError;
use crate::models::{resolve_method, RelayRequest};
use crate::nullifier::{ConsumeOutcome, NullifierStore};
use crate::verifier::ProofVerifier;

/// Result of a fully authorized and dispatched request
#[derive(Debug)]
pub struct RelaySuccess {
    pub request_id: Uuid,
    pub data: Value,
}

pub struct AccessRelay {
    verifier: Arc<dyn ProofVerifier>,
    registry: Arc<EndpointRegistry>,
    nullifiers: Arc<dyn NullifierStore>,
    allowlist: Allowlist,
    dispatcher: Dispatcher,
    audit: AccessLog,
    schema: SignalSchema,
}

impl AccessRelay {
    pub fn new(
        verifier: Arc<dyn ProofVerifier>,
        registry: Arc<EndpointRegistry>,
        nullifiers: Arc<dyn NullifierStore>,
        allowlist: Allowlist,
        dispatcher: Dispatcher,
        audit: AccessLog,
        schema: SignalSchema,
    ) -> Self {
        Self {
            verifier,
            registry,
            nullifiers,
            allowlist,
            dispatcher,
            audit,
            schema,
        }
    }

    pub fn nullifiers(&self) -> &Arc<dyn NullifierStore> {
        &self.nullifiers
    }

    pub fn audit_log(&self) -> &AccessLog {
        &self.audit
    }

    /// Run one request through the full pipeline
    pub async fn authorize(
        &self,
        request: RelayRequest,
        inbound_method: Method,
    ) -> Result<RelaySuccess, RelayError> {
        let request_id = Uuid::new_v4();

        let method = resolve_method(request.method.as_deref(), &inbound_method)
            .map_err(RelayError::InvalidRequest)?;
        request
            .payload
            .validate()
            .map_err(RelayError::InvalidRequest)?;

        // Pairing checks are CPU-bound; keep them off the async workers
        let verifier = self.verifier.clone();
        let proof = request.proof;
        let signals = request.public_signals;
        let (valid, signals) = tokio::task::spawn_blocking(move || {
            let valid = verifier.verify(&proof, &signals);
            (valid, signals)
        })
        .await
        .map_err(|e| {
            tracing::error!("Verifier task failed: {}", e);
            RelayError::Internal("proof verification did not complete".to_string())
        })?;

        if !valid {
            tracing::warn!("Request {} rejected: proof verification failed", request_id);
            return Err(RelayError::InvalidProof);
        }

        let AccessSignals {
            nullifier,
            organization_commitment,
        } = self.schema.extract(&signals).map_err(|e| {
            tracing::warn!("Request {} rejected: {}", request_id, e);
            RelayError::MalformedSignals(e.to_string())
        })?;

        let endpoint_hash = request
            .endpoint_hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(RelayError::MissingEndpoint)?
            .to_string();

        let mut entry = AccessLogEntry {
            request_id,
            timestamp: chrono::Utc::now(),
            nullifier: nullifier.clone(),
            resolved_endpoint: None,
            payload: request.payload.redacted(),
            method: method.to_string(),
            organization_id: None,
            organization_commitment: organization_commitment.clone(),
            endpoint_hash: endpoint_hash.clone(),
            outcome: AccessOutcome::Rejected,
            error: None,
        };

        let Some(mapping) = self.registry.resolve(&endpoint_hash).await else {
            tracing::warn!("Request {} rejected: unknown endpoint hash {}", request_id, endpoint_hash);
            return Err(self.reject(entry, RelayError::UnknownEndpoint).await);
        };
        entry.resolved_endpoint = Some(mapping.original_url.clone());
        entry.organization_id = Some(mapping.organization_id.clone());

        if !self.allowlist.allows(&mapping.original_url) {
            tracing::warn!(
                "Request {} rejected: endpoint {} is not in the allowlist",
                request_id,
                endpoint_hash
            );
            return Err(self.reject(entry, RelayError::EndpointNotAllowed).await);
        }

        match self.nullifiers.try_consume(&nullifier).await {
            Ok(ConsumeOutcome::Consumed) => {}
            Ok(ConsumeOutcome::AlreadyConsumed) => {
                tracing::warn!("Nullifier replay detected: {}", nullifier);
                return Err(self.reject(entry, RelayError::ReplayDetected).await);
            }
            Err(e) => {
                tracing::error!("Nullifier store error: {}", e);
                return Err(RelayError::Internal(
                    "nullifier store unavailable".to_string(),
                ));
            }
        }

        tracing::debug!(
            "Request {} authorized for endpoint {}, dispatching {}",
            request_id,
            endpoint_hash,
            method
        );

        let dispatched = self
            .dispatcher
            .dispatch(DispatchRequest {
                method,
                url: &mapping.original_url,
                payload: &request.payload,
                nullifier: &nullifier,
                organization_commitment: &organization_commitment,
                endpoint_hash: &endpoint_hash,
            })
            .await;

        entry.timestamp = chrono::Utc::now();
        match &dispatched {
            Ok(_) => entry.outcome = AccessOutcome::Authorized,
            Err(e) => {
                entry.outcome = AccessOutcome::DispatchFailed;
                entry.error = Some(e.to_string());
            }
        }
        self.audit.append(&entry).await;

        match dispatched {
            Ok(data) => {
                tracing::info!("Access granted for nullifier: {}", nullifier);
                Ok(RelaySuccess { request_id, data })
            }
            Err(e) => {
                tracing::warn!("Dispatch failed for request {}: {}", request_id, e);
                Err(RelayError::Upstream(e.to_string()))
            }
        }
    }

    /// Record a refusal that happened after the nullifier was known
    async fn reject(&self, mut entry: AccessLogEntry, error: RelayError) -> RelayError {
        entry.timestamp = chrono::Utc::now();
        entry.outcome = AccessOutcome::Rejected;
        entry.error = Some(error.reason().to_string());
        self.audit.append(&entry).await;
        error
    }
}
