//! Proof verification capability
//!
//! The relay only needs a yes/no verdict for (proof, public signals). The
//! production implementation checks snarkjs-format Groth16 proofs over BN254
//! with arkworks; there is no structural shortcut that accepts a proof without
//! running the pairing check.

use anyhow::{Context, Result};
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof as Groth16Proof, VerifyingKey};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};
use zk_gateway_common::{Proof, PublicSignals};

/// BN254 scalar field modulus, decimal
const FR_MODULUS: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// BN254 base field modulus, decimal
const FQ_MODULUS: &str =
    "21888242871839275222246405745257275088696311157297823662689037894645226208583";

/// Decides whether a proof is valid for its public signals.
///
/// Implementations must be deterministic and free of side effects.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &Proof, signals: &PublicSignals) -> bool;
}

#[derive(Debug, Error)]
enum VerifyError {
    #[error("malformed proof: {0}")]
    Malformed(String),

    #[error("proof JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected {expected} public signals, got {actual}")]
    SignalCount { expected: usize, actual: usize },

    #[error("non-canonical field element: {0}")]
    NonCanonical(String),

    #[error("point not on curve or not in subgroup")]
    InvalidPoint,

    #[error("verifier: {0}")]
    Synthesis(String),
}

#[derive(Debug, Deserialize)]
struct SnarkjsVerificationKey {
    protocol: String,
    curve: String,
    #[serde(rename = "nPublic")]
    n_public: usize,
    vk_alpha_1: Vec<String>,
    vk_beta_2: Vec<Vec<String>>,
    vk_gamma_2: Vec<Vec<String>>,
    vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SnarkjsProof {
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    curve: Option<String>,
    pi_a: Vec<String>,
    pi_b: Vec<Vec<String>>,
    pi_c: Vec<String>,
}

/// Groth16 verifier for snarkjs proofs on the bn128 curve
pub struct Groth16Verifier {
    pvk: PreparedVerifyingKey<Bn254>,
    n_public: usize,
}

impl Groth16Verifier {
    /// Load a snarkjs `verification_key.json`
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read verification key {}", path.display()))?;
        let verifier = Self::from_json(&data)
            .with_context(|| format!("Invalid verification key {}", path.display()))?;
        info!(
            "Loaded Groth16 verification key from {} ({} public signals)",
            path.display(),
            verifier.n_public
        );
        Ok(verifier)
    }

    /// Parse a snarkjs verification key from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let key: SnarkjsVerificationKey =
            serde_json::from_str(json).context("Failed to parse verification key JSON")?;

        if key.protocol != "groth16" {
            anyhow::bail!("Unsupported protocol '{}', expected groth16", key.protocol);
        }
        if key.curve != "bn128" {
            anyhow::bail!("Unsupported curve '{}', expected bn128", key.curve);
        }
        if key.ic.len() != key.n_public + 1 {
            anyhow::bail!(
                "IC has {} points but nPublic is {}",
                key.ic.len(),
                key.n_public
            );
        }

        let vk = VerifyingKey::<Bn254> {
            alpha_g1: parse_g1(&key.vk_alpha_1).context("vk_alpha_1")?,
            beta_g2: parse_g2(&key.vk_beta_2).context("vk_beta_2")?,
            gamma_g2: parse_g2(&key.vk_gamma_2).context("vk_gamma_2")?,
            delta_g2: parse_g2(&key.vk_delta_2).context("vk_delta_2")?,
            gamma_abc_g1: key
                .ic
                .iter()
                .map(|p| parse_g1(p))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("IC")?,
        };

        Ok(Self {
            pvk: ark_groth16::prepare_verifying_key(&vk),
            n_public: key.n_public,
        })
    }

    /// Number of public signals the circuit exposes
    pub fn n_public(&self) -> usize {
        self.n_public
    }

    fn check(&self, proof: &Proof, signals: &PublicSignals) -> std::result::Result<bool, VerifyError> {
        let parsed: SnarkjsProof = serde_json::from_value(proof.as_json().clone())?;

        if parsed.protocol.as_deref().is_some_and(|p| p != "groth16") {
            return Err(VerifyError::Malformed("protocol is not groth16".to_string()));
        }
        if parsed.curve.as_deref().is_some_and(|c| c != "bn128") {
            return Err(VerifyError::Malformed("curve is not bn128".to_string()));
        }
        if signals.len() != self.n_public {
            return Err(VerifyError::SignalCount {
                expected: self.n_public,
                actual: signals.len(),
            });
        }

        let groth16_proof = Groth16Proof::<Bn254> {
            a: parse_g1(&parsed.pi_a)?,
            b: parse_g2(&parsed.pi_b)?,
            c: parse_g1(&parsed.pi_c)?,
        };

        let inputs = signals
            .as_slice()
            .iter()
            .map(|s| parse_fr(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Groth16::<Bn254>::verify_proof(&self.pvk, &groth16_proof, &inputs)
            .map_err(|e| VerifyError::Synthesis(e.to_string()))
    }
}

impl ProofVerifier for Groth16Verifier {
    fn verify(&self, proof: &Proof, signals: &PublicSignals) -> bool {
        match self.check(proof, signals) {
            Ok(valid) => valid,
            Err(e) => {
                debug!("Rejecting proof: {}", e);
                false
            }
        }
    }
}

/// Whether `s` is the canonical decimal form of an integer below `modulus`.
///
/// Field parsing reduces modulo p, so `x` and `x + p` would verify alike
/// while comparing unequal as strings. Only the canonical form is accepted.
fn is_canonical_decimal(s: &str, modulus: &str) -> bool {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if s.len() > 1 && s.starts_with('0') {
        return false;
    }
    s.len() < modulus.len() || (s.len() == modulus.len() && s < modulus)
}

fn parse_fr(s: &str) -> std::result::Result<Fr, VerifyError> {
    if !is_canonical_decimal(s, FR_MODULUS) {
        return Err(VerifyError::NonCanonical(s.to_string()));
    }
    Fr::from_str(s).map_err(|_| VerifyError::NonCanonical(s.to_string()))
}

fn parse_fq(s: &str) -> std::result::Result<Fq, VerifyError> {
    if !is_canonical_decimal(s, FQ_MODULUS) {
        return Err(VerifyError::NonCanonical(s.to_string()));
    }
    Fq::from_str(s).map_err(|_| VerifyError::NonCanonical(s.to_string()))
}

/// `[x, y, "1"]` affine coordinates
fn parse_g1(coords: &[String]) -> std::result::Result<G1Affine, VerifyError> {
    match coords {
        [x, y] | [x, y, _] => {
            if coords.len() == 3 && coords[2] != "1" {
                return Err(VerifyError::Malformed("G1 point is not affine".to_string()));
            }
            let point = G1Affine::new_unchecked(parse_fq(x)?, parse_fq(y)?);
            if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
                return Err(VerifyError::InvalidPoint);
            }
            Ok(point)
        }
        _ => Err(VerifyError::Malformed(format!(
            "G1 point has {} coordinates",
            coords.len()
        ))),
    }
}

/// `[[x.c0, x.c1], [y.c0, y.c1], ["1", "0"]]` affine coordinates
fn parse_g2(coords: &[Vec<String>]) -> std::result::Result<G2Affine, VerifyError> {
    let fq2 = |pair: &Vec<String>| -> std::result::Result<Fq2, VerifyError> {
        match pair.as_slice() {
            [c0, c1] => Ok(Fq2::new(parse_fq(c0)?, parse_fq(c1)?)),
            _ => Err(VerifyError::Malformed("G2 coordinate is not a pair".to_string())),
        }
    };

    match coords {
        [x, y] | [x, y, _] => {
            if coords.len() == 3 && coords[2] != ["1", "0"] {
                return Err(VerifyError::Malformed("G2 point is not affine".to_string()));
            }
            let point = G2Affine::new_unchecked(fq2(x)?, fq2(y)?);
            if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
                return Err(VerifyError::InvalidPoint);
            }
            Ok(point)
        }
        _ => Err(VerifyError::Malformed(format!(
            "G2 point has {} coordinates",
            coords.len()
        ))),
    }
}
