//! Rule engine configuration.

use claimdrift_claims::{FingerprintConfig, short_digest};
use claimdrift_core::json::canonical_value_string;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::MIN_SCORE;

pub const DEFAULT_ASSERTIVENESS_DELTA: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
  /// Minimum confidence increase for `assertiveness_increase`.
  pub assertiveness_delta: f64,
  pub fingerprint:         FingerprintConfig,
}

impl Default for RuleConfig {
  fn default() -> Self {
    Self {
      assertiveness_delta: DEFAULT_ASSERTIVENESS_DELTA,
      fingerprint:         FingerprintConfig::default(),
    }
  }
}

impl RuleConfig {
  /// Identifies the full configuration a decision was produced under.
  pub fn config_hash(&self) -> String {
    short_digest(&canonical_value_string(&json!({
      "fingerprint":         self.fingerprint.config_hash(),
      "assertiveness_delta": self.assertiveness_delta,
      "min_score":           MIN_SCORE,
    })))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_tracks_threshold() {
    let a = RuleConfig::default();
    let b = RuleConfig { assertiveness_delta: 0.3, ..Default::default() };
    assert_eq!(a.config_hash(), RuleConfig::default().config_hash());
    assert_ne!(a.config_hash(), b.config_hash());
    assert_eq!(a.config_hash().len(), 16);
  }
}
