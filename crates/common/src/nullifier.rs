use serde::{Deserialize, Serialize};
use std::fmt;

/// A one-time token derived from the proof's private witness.
///
/// Carried as the decimal field-element string the circuit emits. Once a
/// nullifier has been consumed it can never authorize another request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nullifier(String);

impl Nullifier {
    /// Create a nullifier from its signal string
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Nullifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
