//! Upstream dispatch
//!
//! Forwards an authorized request to its resolved upstream. Loopback targets
//! are answered locally with a synthesized echo so a development setup works
//! without a running upstream.

use axum::http::Method;
use serde_json::{json, Value};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use url::{Host, Url};
use zk_gateway_common::Nullifier;

use crate::models::RelayPayload;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream responded with status {0}")]
    Status(u16),
}

/// Everything the dispatcher needs to know about one authorized request
pub struct DispatchRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub payload: &'a RelayPayload,
    pub nullifier: &'a Nullifier,
    pub organization_commitment: &'a str,
    pub endpoint_hash: &'a str,
}

pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client, e.g. one with custom DNS overrides
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn dispatch(&self, req: DispatchRequest<'_>) -> Result<Value, DispatchError> {
        let url = Url::parse(req.url).map_err(|e| DispatchError::InvalidUrl(e.to_string()))?;

        if is_loopback(&url) {
            tracing::debug!("Synthesizing local response for {}", req.endpoint_hash);
            return Ok(local_response(&req));
        }

        let headers = req
            .payload
            .header_map()
            .map_err(DispatchError::InvalidPayload)?;

        let mut builder = self
            .client
            .request(req.method.clone(), url)
            .headers(headers)
            .query(&req.payload.query_pairs());

        // Sent for every method, GET included
        if let Some(data) = &req.payload.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                "Upstream for {} responded with {}",
                req.endpoint_hash,
                status
            );
            return Err(DispatchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(decode_body(&body))
    }
}

/// Local hostnames, loopback and unspecified addresses
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_local_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_local_ip(IpAddr::V6(ip)),
        None => false,
    }
}

fn is_local_ip(ip: IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

fn local_response(req: &DispatchRequest<'_>) -> Value {
    json!({
        "success": true,
        "message": "Request processed locally",
        "originalPayload": req.payload,
        "nullifier": req.nullifier,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "method": req.method.as_str(),
        "endpointHash": req.endpoint_hash,
        "orgId": req.organization_commitment,
    })
}

/// JSON bodies pass through; anything else is returned as a string
fn decode_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback(&url("http://localhost:3000/echo")));
        assert!(is_loopback(&url("http://LOCALHOST/echo")));
        assert!(is_loopback(&url("http://api.localhost/")));
        assert!(is_loopback(&url("http://127.0.0.1:8080/")));
        assert!(is_loopback(&url("http://127.1.2.3/")));
        assert!(is_loopback(&url("http://[::1]:8080/")));
        assert!(is_loopback(&url("http://0.0.0.0/")));

        assert!(!is_loopback(&url("https://api.example.com/data")));
        assert!(!is_loopback(&url("https://localhost.example.com/")));
        assert!(!is_loopback(&url("http://10.0.0.1/")));
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_body(b"plain text"), json!("plain text"));
    }

    #[tokio::test]
    async fn test_loopback_is_synthesized() {
        let dispatcher = Dispatcher::new(Duration::from_secs(1)).unwrap();
        let payload = RelayPayload {
            data: Some(json!({"query": "balance"})),
            ..Default::default()
        };
        let nullifier = Nullifier::new("42");

        let body = dispatcher
            .dispatch(DispatchRequest {
                method: Method::POST,
                url: "http://localhost:3000/echo",
                payload: &payload,
                nullifier: &nullifier,
                organization_commitment: "7",
                endpoint_hash: "abcdef0123456789",
            })
            .await
            .unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["originalPayload"]["data"]["query"], "balance");
        assert_eq!(body["nullifier"], "42");
        assert_eq!(body["method"], "POST");
        assert_eq!(body["endpointHash"], "abcdef0123456789");
        assert_eq!(body["orgId"], "7");
        assert!(body.get("actualEndpoint").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_error() {
        let dispatcher = Dispatcher::new(Duration::from_secs(2)).unwrap();
        let payload = RelayPayload::default();
        let nullifier = Nullifier::new("1");

        let result = dispatcher
            .dispatch(DispatchRequest {
                method: Method::GET,
                url: "http://upstream.invalid/data",
                payload: &payload,
                nullifier: &nullifier,
                organization_commitment: "7",
                endpoint_hash: "abcdef0123456789",
            })
            .await;

        assert!(matches!(result, Err(DispatchError::Transport(_))));
    }
}
