//! Public signal vector and its versioned layout
//!
//! The circuit emits its public outputs as an ordered list of field elements.
//! Which position carries which value is a contract with the circuit, so it is
//! captured in a named [`SignalSchema`] instead of bare indices scattered
//! through the relay. A circuit change that reorders outputs needs a new
//! schema version and fails loudly under the old one.

use crate::{Error, Nullifier, Result};
use serde::{Deserialize, Serialize};

/// Ordered public outputs of a proof, as decimal field-element strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicSignals(Vec<String>);

impl PublicSignals {
    pub fn new(signals: Vec<String>) -> Self {
        Self(signals)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for PublicSignals {
    fn from(signals: Vec<String>) -> Self {
        Self(signals)
    }
}

/// Named, versioned layout of the access circuit's public signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalSchema {
    pub name: &'static str,
    pub version: u32,
    pub nullifier_index: usize,
    pub organization_index: usize,
    pub min_len: usize,
}

impl SignalSchema {
    /// `[nullifier, organization_commitment, ...]`
    pub const ACCESS_V1: SignalSchema = SignalSchema {
        name: "access-v1",
        version: 1,
        nullifier_index: 0,
        organization_index: 1,
        min_len: 2,
    };

    /// Look up a schema by version number
    pub fn for_version(version: u32) -> Result<Self> {
        match version {
            1 => Ok(Self::ACCESS_V1),
            other => Err(Error::UnsupportedSchema(other)),
        }
    }

    /// Extract the named fields, validating length before any positional read
    pub fn extract(&self, signals: &PublicSignals) -> Result<AccessSignals> {
        if signals.len() < self.min_len {
            return Err(Error::MalformedSignals(format!(
                "{} expects at least {} public signals, got {}",
                self.name,
                self.min_len,
                signals.len()
            )));
        }

        let nullifier = signals
            .get(self.nullifier_index)
            .map(str::trim)
            .unwrap_or_default();
        if nullifier.is_empty() {
            return Err(Error::MalformedSignals("nullifier signal is empty".to_string()));
        }

        let organization_commitment = signals
            .get(self.organization_index)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        Ok(AccessSignals {
            nullifier: Nullifier::new(nullifier),
            organization_commitment,
        })
    }
}

impl Default for SignalSchema {
    fn default() -> Self {
        Self::ACCESS_V1
    }
}

/// Fields extracted from the public signals of an access proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSignals {
    pub nullifier: Nullifier,
    pub organization_commitment: String,
}
