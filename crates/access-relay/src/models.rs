use axum::http::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use zk_gateway_common::{Proof, PublicSignals};

/// Body of an access request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub proof: Proof,
    pub public_signals: PublicSignals,
    #[serde(default)]
    pub endpoint_hash: Option<String>,
    #[serde(default)]
    pub payload: RelayPayload,
    /// Upstream method; falls back to the inbound method when absent
    #[serde(default)]
    pub method: Option<String>,
}

/// Headers whose values never reach the access log
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-admin-token",
];

pub const REDACTED: &str = "[REDACTED]";

/// Caller-supplied content forwarded to the upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl RelayPayload {
    /// Reject shapes that cannot be forwarded as-is
    pub fn validate(&self) -> Result<(), String> {
        if let Some(params) = &self.params {
            for (key, value) in params {
                if value.is_object() || value.is_array() {
                    return Err(format!("query parameter `{}` must be a scalar", key));
                }
            }
        }
        self.header_map().map(|_| ())
    }

    /// Query pairs in key order; null values are omitted
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(params) = &self.params else {
            return Vec::new();
        };
        params
            .iter()
            .filter_map(|(key, value)| {
                let rendered = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), rendered))
            })
            .collect()
    }

    pub fn header_map(&self) -> Result<HeaderMap, String> {
        let mut map = HeaderMap::new();
        let Some(headers) = &self.headers else {
            return Ok(map);
        };
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name `{}`", name))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| format!("invalid value for header `{}`", name))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Copy with sensitive header values replaced, for persisting
    pub fn redacted(&self) -> RelayPayload {
        let mut copy = self.clone();
        if let Some(headers) = copy.headers.as_mut() {
            for (name, value) in headers.iter_mut() {
                if SENSITIVE_HEADERS
                    .iter()
                    .any(|s| name.trim().eq_ignore_ascii_case(s))
                {
                    *value = REDACTED.to_string();
                }
            }
        }
        copy
    }
}

/// Upstream method: the explicit `method` field if present, else the inbound one
pub fn resolve_method(requested: Option<&str>, inbound: &Method) -> Result<Method, String> {
    match requested.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| format!("invalid method `{}`", m)),
        None => Ok(inbound.clone()),
    }
}
