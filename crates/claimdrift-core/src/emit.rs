//! Emission modes and statuses.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How labels produced in a pass leave the system.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EmitMode {
  /// Labels are recorded and audited but never delivered.
  #[default]
  DetectOnly,
  /// Labels are delivered. Requires explicit confirmation.
  Emit,
  /// Labels are held back and written to the quarantine audit trail.
  Quarantine,
}

impl EmitMode {
  /// `emit` without confirmation degrades to `detect-only`.
  pub fn confirmed(self, confirm: bool) -> Self {
    match self {
      EmitMode::Emit if !confirm => EmitMode::DetectOnly,
      other => other,
    }
  }

  /// The status every record flushed under this mode receives.
  pub fn status(self) -> EmitStatus {
    match self {
      EmitMode::Emit => EmitStatus::Emitted,
      EmitMode::DetectOnly | EmitMode::Quarantine => EmitStatus::Suppressed,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmitStatus {
  Emitted,
  Suppressed,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn modes_round_trip_through_their_names() {
    for mode in [EmitMode::DetectOnly, EmitMode::Emit, EmitMode::Quarantine] {
      assert_eq!(EmitMode::from_str(&mode.to_string()).unwrap(), mode);
    }
    assert_eq!(EmitMode::DetectOnly.to_string(), "detect-only");
    assert!(EmitMode::from_str("loud").is_err());
  }

  #[test]
  fn emit_requires_confirmation() {
    assert_eq!(EmitMode::Emit.confirmed(false), EmitMode::DetectOnly);
    assert_eq!(EmitMode::Emit.confirmed(true), EmitMode::Emit);
    assert_eq!(EmitMode::Quarantine.confirmed(false), EmitMode::Quarantine);
  }

  #[test]
  fn only_emit_mode_emits() {
    assert_eq!(EmitMode::Emit.status(), EmitStatus::Emitted);
    assert_eq!(EmitMode::Quarantine.status(), EmitStatus::Suppressed);
    assert_eq!(EmitMode::DetectOnly.status(), EmitStatus::Suppressed);
  }
}
