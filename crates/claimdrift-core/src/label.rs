//! Label types: what rules produce and what the label store persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  json::to_canonical_string,
  time::{deserialize_utc, serialize_utc},
  Result,
};

// ─── Candidates ──────────────────────────────────────────────────────────────

/// One evidence record attached to a label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Evidence {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prior:          Option<String>,
  pub post:           String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date_mentioned: Option<String>,
}

impl Evidence {
  pub fn post(uri: impl Into<String>) -> Self {
    Self { prior: None, post: uri.into(), date_mentioned: None }
  }

  pub fn with_prior(prior: impl Into<String>, uri: impl Into<String>) -> Self {
    Self { prior: Some(prior.into()), post: uri.into(), date_mentioned: None }
  }
}

/// A scored label proposed by a rule. Ephemeral; never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCandidate {
  pub subject_uri: String,
  pub label:       String,
  pub score:       f64,
  pub reasons:     Vec<String>,
  pub evidence:    Vec<Evidence>,
  pub rule_id:     String,
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Which re-evaluation axis produced a label.
///
/// The axis is part of the payload, so a post flagged on both axes carries
/// one label and one ledger row per axis. Each axis reconciles only its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
  ThreadRoot,
  ClaimGroup,
}

impl SchedulerKind {
  pub fn as_str(self) -> &'static str {
    match self {
      SchedulerKind::ThreadRoot => "thread_root",
      SchedulerKind::ClaimGroup => "claim_group",
    }
  }
}

/// The persisted label body. Two payloads are the same label only if their
/// canonical JSON is byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPayload {
  pub label:     String,
  pub score:     f64,
  pub reasons:   Vec<String>,
  pub evidence:  Vec<Evidence>,
  #[serde(deserialize_with = "deserialize_utc", serialize_with = "serialize_utc")]
  pub time:      DateTime<Utc>,
  pub labeler:   String,
  pub rule_id:   String,
  pub scheduler: SchedulerKind,
}

impl LabelPayload {
  pub fn from_candidate(
    candidate: &LabelCandidate,
    time: DateTime<Utc>,
    labeler: &str,
    scheduler: SchedulerKind,
  ) -> Self {
    Self {
      label: candidate.label.clone(),
      score: candidate.score,
      reasons: candidate.reasons.clone(),
      evidence: candidate.evidence.clone(),
      time,
      labeler: labeler.to_owned(),
      rule_id: candidate.rule_id.clone(),
      scheduler,
    }
  }

  pub fn to_value(&self) -> Result<Value> {
    Ok(crate::json::canonicalize(serde_json::to_value(self)?))
  }

  pub fn to_canonical_json(&self) -> Result<String> { to_canonical_string(self) }
}

// ─── Persisted ───────────────────────────────────────────────────────────────

/// A label row as stored. `payload` is kept as raw JSON so labels written by
/// other labelers survive a round trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLabel {
  pub label_id:    i64,
  pub subject_uri: String,
  pub labeler_did: String,
  pub payload:     Value,
  pub ctime:       DateTime<Utc>,
  pub expired_at:  Option<DateTime<Utc>>,
}

impl ActiveLabel {
  /// The label name carried in the payload, if any.
  pub fn name(&self) -> Option<&str> { self.payload.get("label")?.as_str() }

  /// The axis that produced the label, for labels written by this engine.
  pub fn scheduler(&self) -> Option<SchedulerKind> {
    serde_json::from_value(self.payload.get("scheduler")?.clone()).ok()
  }

  pub fn is_active(&self) -> bool { self.expired_at.is_none() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn candidate() -> LabelCandidate {
    LabelCandidate {
      subject_uri: "at://a/2".into(),
      label:       "quote_mismatch".into(),
      score:       0.55,
      reasons:     vec!["no link".into()],
      evidence:    vec![Evidence::post("at://a/2")],
      rule_id:     "quote_mismatch".into(),
    }
  }

  #[test]
  fn payload_json_is_canonical_and_stable() {
    let time = Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap();
    let a = LabelPayload::from_candidate(&candidate(), time, "did:labeler:drift", SchedulerKind::ThreadRoot);
    let b = a.clone();

    let json = a.to_canonical_json().unwrap();
    assert_eq!(json, b.to_canonical_json().unwrap());
    assert!(json.starts_with(r#"{"evidence":[{"post":"at://a/2"}],"label":"quote_mismatch""#));
    assert!(json.contains(r#""scheduler":"thread_root""#));
  }

  #[test]
  fn each_axis_is_a_distinct_payload() {
    let time = Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap();
    let thread = LabelPayload::from_candidate(&candidate(), time, "did:labeler:drift", SchedulerKind::ThreadRoot);
    let group = LabelPayload::from_candidate(&candidate(), time, "did:labeler:drift", SchedulerKind::ClaimGroup);
    assert_ne!(thread.to_canonical_json().unwrap(), group.to_canonical_json().unwrap());
  }

  #[test]
  fn active_label_exposes_name_and_scheduler() {
    let time = Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap();
    let payload = LabelPayload::from_candidate(&candidate(), time, "did:labeler:drift", SchedulerKind::ClaimGroup);
    let label = ActiveLabel {
      label_id:    1,
      subject_uri: "at://a/2".into(),
      labeler_did: "did:labeler:drift".into(),
      payload:     payload.to_value().unwrap(),
      ctime:       time,
      expired_at:  None,
    };
    assert_eq!(label.name(), Some("quote_mismatch"));
    assert_eq!(label.scheduler(), Some(SchedulerKind::ClaimGroup));
    assert!(label.is_active());
  }
}
