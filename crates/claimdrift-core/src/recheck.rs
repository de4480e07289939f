//! Recheck requests on the two re-evaluation axes.

use serde::{Deserialize, Serialize};

/// Identity of a pending re-evaluation unit. Enqueueing an existing key
/// reschedules it rather than duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecheckKey {
  /// Every post in the conversation rooted at `root_uri`.
  Thread { root_uri: String },
  /// Every post by `author_did` carrying the claim `fingerprint`.
  ClaimGroup { author_did: String, fingerprint: String },
}

impl RecheckKey {
  pub fn thread(root_uri: impl Into<String>) -> Self {
    RecheckKey::Thread { root_uri: root_uri.into() }
  }

  pub fn claim_group(author_did: impl Into<String>, fingerprint: impl Into<String>) -> Self {
    RecheckKey::ClaimGroup {
      author_did:  author_did.into(),
      fingerprint: fingerprint.into(),
    }
  }

  pub fn kind(&self) -> RecheckKind {
    match self {
      RecheckKey::Thread { .. } => RecheckKind::Thread,
      RecheckKey::ClaimGroup { .. } => RecheckKind::ClaimGroup,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecheckKind {
  Thread,
  ClaimGroup,
}
