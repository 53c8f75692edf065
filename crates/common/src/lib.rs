//! Types shared by the endpoint registry and the access relay.

pub mod error;
pub mod nullifier;
pub mod proof;
pub mod signals;

pub use error::{Error, Result};
pub use nullifier::Nullifier;
pub use proof::Proof;
pub use signals::{AccessSignals, PublicSignals, SignalSchema};
