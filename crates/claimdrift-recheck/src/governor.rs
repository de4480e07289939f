//! The emission governor: decides once per pass whether the labels inserted
//! during that pass are emitted, suppressed or quarantined.
//!
//! The pass starts in the configured mode. Three independent trips force
//! `quarantine`:
//! - the per-pass emission cap is reached,
//! - one rule fired more often in this pass than its budget allows,
//! - one rule fired more often over the sliding window (counted from the
//!   ledger) than its budget allows.
//!
//! A trip is a normal outcome, not an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use claimdrift_core::{
  emit::{EmitMode, EmitStatus},
  label::{Evidence, LabelCandidate},
};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_WINDOW_HOURS, hours_before};

use crate::config::{BudgetConfig, EmitConfig};

/// Round a score to three decimals for audit output.
pub fn round_score(score: f64) -> f64 { (score * 1000.0).round() / 1000.0 }

// ─── Records ─────────────────────────────────────────────────────────────────

/// One label as it leaves the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitRecord {
  pub subject_uri: String,
  pub label:       String,
  pub score:       f64,
  pub reasons:     Vec<String>,
  pub evidence:    Vec<Evidence>,
  pub rule_id:     String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub emit_reason: Option<String>,
}

impl From<&LabelCandidate> for EmitRecord {
  fn from(c: &LabelCandidate) -> Self {
    Self {
      subject_uri: c.subject_uri.clone(),
      label:       c.label.clone(),
      score:       round_score(c.score),
      reasons:     c.reasons.clone(),
      evidence:    c.evidence.clone(),
      rule_id:     c.rule_id.clone(),
      emit_reason: None,
    }
  }
}

/// The result of a flush: the final mode and every buffered record, tagged
/// with the trip reason if there was one.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
  pub mode:    EmitMode,
  pub status:  EmitStatus,
  pub reason:  Option<String>,
  pub records: Vec<EmitRecord>,
}

// ─── Governor ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Governor {
  mode:       EmitMode,
  cap:        usize,
  budgets:    BTreeMap<String, u64>,
  window:     i64,
  buffer:     Vec<EmitRecord>,
  run_counts: BTreeMap<String, u64>,
  cap_reason: Option<String>,
}

impl Governor {
  pub fn new(emit: &EmitConfig, budgets: &BudgetConfig) -> Self {
    Self::with_mode(emit.effective_mode(), emit.max_per_pass, budgets)
  }

  pub fn with_mode(mode: EmitMode, cap: usize, budgets: &BudgetConfig) -> Self {
    Self {
      mode,
      cap,
      budgets: budgets.per_rule.clone(),
      window: budgets.window_hours(),
      buffer: Vec::new(),
      run_counts: BTreeMap::new(),
      cap_reason: None,
    }
  }

  pub fn mode(&self) -> EmitMode { self.mode }

  pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

  pub fn len(&self) -> usize { self.buffer.len() }

  /// Buffer a newly inserted label.
  pub fn record(&mut self, record: EmitRecord) {
    *self.run_counts.entry(record.rule_id.clone()).or_default() += 1;
    self.buffer.push(record);

    if self.cap > 0 && self.buffer.len() >= self.cap && self.mode != EmitMode::Quarantine {
      tracing::warn!(cap = self.cap, "emission cap reached; quarantining pass");
      self.mode = EmitMode::Quarantine;
      self.cap_reason = Some(format!("emit_cap_reached:{}", self.cap));
    }
  }

  /// First rule (by id) whose activations in this pass exceed its budget.
  pub fn run_budget_breach(&self) -> Option<String> {
    self.run_counts.iter().find_map(|(rule, &count)| {
      let limit = *self.budgets.get(rule)?;
      (count > limit).then(|| format!("run_budget_exceeded:{rule}:{count}>{limit}"))
    })
  }

  /// First budgeted rule whose activations over the window exceed its budget.
  pub fn window_budget_breach(&self, window_counts: &BTreeMap<String, u64>) -> Option<String> {
    self.budgets.iter().find_map(|(rule, &limit)| {
      let count = window_counts.get(rule).copied().unwrap_or(0);
      (count > limit).then(|| format!("window_budget_exceeded:{rule}:{count}>{limit}"))
    })
  }

  /// Start of the sliding budget window ending at `now`. An unusable window
  /// falls back to the default length.
  pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    hours_before(now, self.window).unwrap_or_else(|| {
      tracing::warn!(hours = self.window, "budget window out of range; using {DEFAULT_WINDOW_HOURS}h");
      hours_before(now, DEFAULT_WINDOW_HOURS).unwrap_or(DateTime::<Utc>::MIN_UTC)
    })
  }

  /// Whether [`finish`](Self::finish) would look at window counts.
  pub fn needs_window_counts(&self) -> bool {
    !self.buffer.is_empty()
      && !self.budgets.is_empty()
      && self.mode != EmitMode::Quarantine
      && self.run_budget_breach().is_none()
  }

  /// Evaluate the budgets and release the buffer.
  pub fn finish(self, window_counts: Option<&BTreeMap<String, u64>>) -> FlushOutcome {
    let mut mode = self.mode;
    let mut reason = None;

    if !self.buffer.is_empty() {
      if let Some(r) = self.run_budget_breach() {
        mode = EmitMode::Quarantine;
        reason = Some(r);
      } else if mode != EmitMode::Quarantine
        && let Some(counts) = window_counts
        && let Some(r) = self.window_budget_breach(counts)
      {
        mode = EmitMode::Quarantine;
        reason = Some(r);
      }
    }

    let reason = reason.or(self.cap_reason);
    let mut records = self.buffer;
    if let Some(r) = &reason {
      for record in &mut records {
        record.emit_reason = Some(r.clone());
      }
    }

    FlushOutcome { mode, status: mode.status(), reason, records }
  }
}
