//! Claim identity and the append-only claim history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A claim's content identity: a 16-hex-char digest plus the schema version
/// of the fingerprint algorithm that produced it. Fingerprints of different
/// versions are never equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint {
  pub value:   String,
  pub version: String,
}

impl Fingerprint {
  pub fn new(value: impl Into<String>, version: impl Into<String>) -> Self {
    Self { value: value.into(), version: version.into() }
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.value)
  }
}

/// One observation of a claim: links `(author_did, fingerprint)` to the post
/// that carried it at `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimHistoryEntry {
  pub author_did:    String,
  pub fingerprint:   Fingerprint,
  pub created_at:    DateTime<Utc>,
  /// Assertiveness of the post at the time it was observed.
  pub confidence:    Option<f64>,
  /// The attribution token found in the post, empty if none.
  pub provenance:    String,
  pub evidence_hash: String,
  pub post_uri:      String,
  pub post_cid:      Option<String>,
}
