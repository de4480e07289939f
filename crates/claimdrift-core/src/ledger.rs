//! Decision ledger rows.
//!
//! The ledger is append-only. The single permitted update moves a row from
//! [`DecisionStatus::Committed`] to [`DecisionStatus::Expired`]; nothing ever
//! moves back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  emit::{EmitMode, EmitStatus},
  label::{Evidence, SchedulerKind},
};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
  Committed,
  Expired,
}

// ─── Inputs and trace ────────────────────────────────────────────────────────

/// The claim signals a decision was computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInputs {
  pub spans:       Vec<String>,
  pub dates:       Vec<String>,
  pub quantities:  Vec<String>,
  pub entities:    Vec<String>,
  pub modal:       Vec<String>,
  /// `preposition:object` pairs, lowercased.
  pub prep_tokens: Vec<String>,
}

/// Why the rule fired, and on which axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionTrace {
  pub reasons:   Vec<String>,
  pub evidence:  Vec<Evidence>,
  pub scheduler: SchedulerKind,
}

// ─── Decisions ───────────────────────────────────────────────────────────────

/// Input to [`LedgerStore::append_decision`](crate::store::LedgerStore::append_decision).
/// The id, timestamp and initial status are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLabelDecision {
  pub subject_uri:         String,
  pub root_uri:            Option<String>,
  pub label:               String,
  pub rule_id:             String,
  pub fingerprint_version: String,
  pub inputs:              DecisionInputs,
  pub evidence_hashes:     Vec<String>,
  pub decision_trace:      DecisionTrace,
  pub config_hash:         String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDecision {
  pub decision_id:         Uuid,
  pub created_at:          DateTime<Utc>,
  pub subject_uri:         String,
  pub root_uri:            Option<String>,
  pub label:               String,
  pub rule_id:             String,
  pub fingerprint_version: String,
  pub inputs:              DecisionInputs,
  pub evidence_hashes:     Vec<String>,
  pub decision_trace:      DecisionTrace,
  pub config_hash:         String,
  pub status:              DecisionStatus,
}

// ─── Quarantine ──────────────────────────────────────────────────────────────

/// Input to [`LedgerStore::append_quarantine_emit`](crate::store::LedgerStore::append_quarantine_emit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuarantineEmit {
  pub emit_mode:   EmitMode,
  pub emit_status: EmitStatus,
  pub emit_reason: Option<String>,
  pub payload:     Value,
}

/// An emission that was held back, with the full payload it would have sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineEmit {
  pub emit_id:     Uuid,
  pub created_at:  DateTime<Utc>,
  pub emit_mode:   EmitMode,
  pub emit_status: EmitStatus,
  pub emit_reason: Option<String>,
  pub payload:     Value,
}
