//! Recheck configuration.
//!
//! Every field has a documented default. Values that parse but make no sense
//! (a zero batch size, a negative TTL, ...) are replaced by the default in
//! [`RecheckConfig::sanitized`] rather than rejected.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use claimdrift_core::emit::EmitMode;
use claimdrift_rules::{RuleConfig, config::DEFAULT_ASSERTIVENESS_DELTA};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_LABELER_DID: &str = "did:labeler:drift";
pub const DEFAULT_BATCH_LIMIT: usize = 100;
pub const DEFAULT_CLAIM_RECHECK_MAX: usize = 25;
pub const DEFAULT_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_TTL_DAYS: i64 = 30;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecheckConfig {
  /// DID stamped on every label this engine writes.
  pub labeler_did:    String,
  /// Thread requests drained per pass.
  pub batch_limit:    usize,
  pub claim_recheck:  ClaimRecheckConfig,
  pub emit:           EmitConfig,
  pub budgets:        BudgetConfig,
  pub rules:          RuleConfig,
  pub label_ttl_days: i64,
  pub interval_secs:  u64,
}

impl Default for RecheckConfig {
  fn default() -> Self {
    Self {
      labeler_did:    DEFAULT_LABELER_DID.to_owned(),
      batch_limit:    DEFAULT_BATCH_LIMIT,
      claim_recheck:  ClaimRecheckConfig::default(),
      emit:           EmitConfig::default(),
      budgets:        BudgetConfig::default(),
      rules:          RuleConfig::default(),
      label_ttl_days: DEFAULT_TTL_DAYS,
      interval_secs:  DEFAULT_INTERVAL_SECS,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimRecheckConfig {
  pub enabled:     bool,
  /// Claim-group requests drained per pass.
  pub max_per_run: usize,
}

impl Default for ClaimRecheckConfig {
  fn default() -> Self { Self { enabled: false, max_per_run: DEFAULT_CLAIM_RECHECK_MAX } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
  #[serde(deserialize_with = "lenient_mode")]
  pub mode:         EmitMode,
  /// `emit` is honoured only when this is set.
  pub confirm:      bool,
  /// Hard cap on records per pass; `0` disables the cap.
  pub max_per_pass: usize,
  pub audit_dir:    PathBuf,
}

impl Default for EmitConfig {
  fn default() -> Self {
    Self {
      mode:         EmitMode::DetectOnly,
      confirm:      false,
      max_per_pass: 0,
      audit_dir:    PathBuf::from("out"),
    }
  }
}

impl EmitConfig {
  /// The mode a pass starts in.
  pub fn effective_mode(&self) -> EmitMode {
    let mode = self.mode.confirmed(self.confirm);
    if mode != self.mode {
      tracing::warn!("emit mode requested without confirmation; falling back to detect-only");
    }
    mode
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
  /// Maximum activations per rule, both per pass and per window.
  #[serde(deserialize_with = "rule_budgets")]
  pub per_rule:     BTreeMap<String, u64>,
  pub window_hours: Option<i64>,
}

impl BudgetConfig {
  pub fn window_hours(&self) -> i64 { self.window_hours.unwrap_or(DEFAULT_WINDOW_HOURS) }
}

// ─── Sanitising ──────────────────────────────────────────────────────────────

impl RecheckConfig {
  /// Replace nonsensical values with their defaults, logging each fallback.
  pub fn sanitized(mut self) -> Self {
    if self.labeler_did.trim().is_empty() {
      tracing::warn!("empty labeler_did; using {DEFAULT_LABELER_DID}");
      self.labeler_did = DEFAULT_LABELER_DID.to_owned();
    }
    if self.batch_limit == 0 {
      tracing::warn!("batch_limit must be positive; using {DEFAULT_BATCH_LIMIT}");
      self.batch_limit = DEFAULT_BATCH_LIMIT;
    }
    if days_before(Utc::now(), self.label_ttl_days).is_none() {
      tracing::warn!(value = self.label_ttl_days, "label_ttl_days out of range; using {DEFAULT_TTL_DAYS}");
      self.label_ttl_days = DEFAULT_TTL_DAYS;
    }
    if self.interval_secs == 0 {
      tracing::warn!("interval_secs must be positive; using {DEFAULT_INTERVAL_SECS}");
      self.interval_secs = DEFAULT_INTERVAL_SECS;
    }
    if let Some(hours) = self.budgets.window_hours
      && hours_before(Utc::now(), hours).is_none()
    {
      tracing::warn!(value = hours, "budget window out of range; using {DEFAULT_WINDOW_HOURS}h");
      self.budgets.window_hours = None;
    }
    let delta = self.rules.assertiveness_delta;
    if !delta.is_finite() || delta < 0.0 {
      tracing::warn!(value = delta, "invalid assertiveness_delta; using {DEFAULT_ASSERTIVENESS_DELTA}");
      self.rules.assertiveness_delta = DEFAULT_ASSERTIVENESS_DELTA;
    }
    self
  }
}

// ─── Time spans ──────────────────────────────────────────────────────────────

/// `now` moved back by `hours`, if `hours` is positive and the result is
/// representable.
pub fn hours_before(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
  if hours <= 0 {
    return None;
  }
  TimeDelta::try_hours(hours).and_then(|d| now.checked_sub_signed(d))
}

/// `now` moved back by `days`, if `days` is positive and the result is
/// representable.
pub fn days_before(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
  if days <= 0 {
    return None;
  }
  TimeDelta::try_days(days).and_then(|d| now.checked_sub_signed(d))
}

// ─── Parsing helpers ─────────────────────────────────────────────────────────

/// Parse `"rule:n,rule:n"`. Malformed entries are skipped.
pub fn parse_rule_budgets(raw: &str) -> BTreeMap<String, u64> {
  raw
    .split(',')
    .filter_map(|part| {
      let (rule, value) = part.trim().split_once(':')?;
      let rule = rule.trim();
      match value.trim().parse::<u64>() {
        Ok(n) if !rule.is_empty() => Some((rule.to_owned(), n)),
        _ => {
          tracing::warn!(entry = part, "ignoring malformed rule budget");
          None
        }
      }
    })
    .collect()
}

fn rule_budgets<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, u64>, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Map(BTreeMap<String, u64>),
    Text(String),
  }

  Ok(match Raw::deserialize(d)? {
    Raw::Map(map) => map,
    Raw::Text(text) => parse_rule_budgets(&text),
  })
}

fn lenient_mode<'de, D: Deserializer<'de>>(d: D) -> Result<EmitMode, D::Error> {
  let raw = String::deserialize(d)?;
  Ok(raw.trim().to_lowercase().parse().unwrap_or_else(|_| {
    tracing::warn!(mode = %raw, "unknown emit mode; using detect-only");
    EmitMode::DetectOnly
  }))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn defaults_match_documentation() {
    let c = RecheckConfig::default();
    assert_eq!(c.labeler_did, "did:labeler:drift");
    assert_eq!(c.batch_limit, 100);
    assert!(!c.claim_recheck.enabled);
    assert_eq!(c.claim_recheck.max_per_run, 25);
    assert_eq!(c.emit.mode, EmitMode::DetectOnly);
    assert_eq!(c.emit.audit_dir, PathBuf::from("out"));
    assert_eq!(c.budgets.window_hours(), 24);
    assert_eq!(c.label_ttl_days, 30);
    assert_eq!(c.interval_secs, 60);
  }

  #[test]
  fn budgets_accept_string_or_map() {
    let a: BudgetConfig = serde_json::from_value(json!({ "per_rule": "quote_mismatch:3, bad, x:y,repeat_claim_no_new_evidence:1" })).unwrap();
    let b: BudgetConfig = serde_json::from_value(json!({ "per_rule": { "quote_mismatch": 3, "repeat_claim_no_new_evidence": 1 } })).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.per_rule.len(), 2);
  }

  #[test]
  fn unknown_mode_falls_back() {
    let c: EmitConfig = serde_json::from_value(json!({ "mode": "LOUD" })).unwrap();
    assert_eq!(c.mode, EmitMode::DetectOnly);
    let c: EmitConfig = serde_json::from_value(json!({ "mode": "Quarantine" })).unwrap();
    assert_eq!(c.mode, EmitMode::Quarantine);
  }

  #[test]
  fn emit_needs_confirmation() {
    let unconfirmed = EmitConfig { mode: EmitMode::Emit, ..Default::default() };
    assert_eq!(unconfirmed.effective_mode(), EmitMode::DetectOnly);
    let confirmed = EmitConfig { mode: EmitMode::Emit, confirm: true, ..Default::default() };
    assert_eq!(confirmed.effective_mode(), EmitMode::Emit);
  }

  #[test]
  fn sanitizing_restores_defaults() {
    let mut c = RecheckConfig { batch_limit: 0, label_ttl_days: -1, interval_secs: 0, ..Default::default() };
    c.budgets.window_hours = Some(0);
    c.rules.assertiveness_delta = f64::NAN;
    let c = c.sanitized();
    assert_eq!(c.batch_limit, 100);
    assert_eq!(c.label_ttl_days, 30);
    assert_eq!(c.interval_secs, 60);
    assert_eq!(c.budgets.window_hours(), 24);
    assert_eq!(c.rules.assertiveness_delta, 0.2);
  }

  #[test]
  fn oversized_spans_fall_back() {
    let mut c = RecheckConfig { label_ttl_days: i64::MAX, ..Default::default() };
    c.budgets.window_hours = Some(i64::MAX / 1000);
    let c = c.sanitized();
    assert_eq!(c.label_ttl_days, 30);
    assert_eq!(c.budgets.window_hours(), 24);

    let large = RecheckConfig { label_ttl_days: 3650, ..Default::default() }.sanitized();
    assert_eq!(large.label_ttl_days, 3650);
  }

  #[test]
  fn spans_are_checked() {
    let now = Utc::now();
    assert_eq!(hours_before(now, 24), Some(now - TimeDelta::hours(24)));
    assert_eq!(days_before(now, 2), Some(now - TimeDelta::days(2)));
    assert!(hours_before(now, 0).is_none());
    assert!(days_before(now, -5).is_none());
    assert!(hours_before(now, i64::MAX / 1000).is_none());
    assert!(days_before(now, i64::MAX).is_none());
  }
}
