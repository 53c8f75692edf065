use serde::{Deserialize, Serialize};

/// Opaque proof object as submitted by the client.
///
/// The relay never inspects it; only a `ProofVerifier` interprets the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof(pub serde_json::Value);

impl Proof {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}
