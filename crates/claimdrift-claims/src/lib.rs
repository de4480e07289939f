//! Claim signal extraction and claim identity.
//!
//! Everything in this crate is pure, synchronous and total: the same text and
//! configuration always produce the same signals, fingerprint and hashes, and
//! no input makes them fail.

pub mod evidence;
pub mod extract;
pub mod fingerprint;
pub mod normalize;
pub mod stability;

pub use evidence::{
  ClaimDelta, ClaimState, claim_history_entry, claim_state, decision_inputs, evidence_hash,
};
pub use extract::{ClaimSignal, extract};
pub use fingerprint::{
  EntityCanon, FINGERPRINT_VERSION, FingerprintConfig, FingerprintDebug, fingerprint,
  fingerprint_debug,
};
pub use normalize::NumberMode;

use sha2::{Digest, Sha256};

/// First 16 hex chars of the SHA-256 of `input`.
pub fn short_digest(input: &str) -> String {
  let hash = Sha256::digest(input.as_bytes());
  let mut hex = hex::encode(hash);
  hex.truncate(16);
  hex
}
