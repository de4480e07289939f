//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-precision RFC 3339 UTC strings so that lexical
//! comparison in SQL matches time order. JSON columns hold canonical JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use claimdrift_core::{
  claim::{ClaimHistoryEntry, Fingerprint},
  emit::{EmitMode, EmitStatus},
  json::to_canonical_string,
  label::ActiveLabel,
  ledger::{DecisionStatus, LabelDecision, QuarantineEmit},
  post::Post,
  store::PostVersion,
  time::format_utc,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { format_utc(dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(to_canonical_string(value)?)
}

fn decode_variant<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownVariant { kind, value: s.to_owned() })
}

pub fn decode_post(raw: &str) -> Result<Post> { Ok(serde_json::from_str(raw)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub struct RawVersion {
  pub archived_at: String,
  pub raw_json:    String,
}

impl RawVersion {
  pub fn into_version(self) -> Result<PostVersion> {
    Ok(PostVersion {
      archived_at: decode_dt(&self.archived_at)?,
      post:        decode_post(&self.raw_json)?,
    })
  }
}

pub struct RawLabel {
  pub label_id:    i64,
  pub subject_uri: String,
  pub labeler_did: String,
  pub payload:     String,
  pub ctime:       String,
  pub expired_at:  Option<String>,
}

pub const LABEL_COLUMNS: &str =
  "label_id, subject_uri, labeler_did, payload, ctime, expired_at";

impl RawLabel {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      label_id:    row.get(0)?,
      subject_uri: row.get(1)?,
      labeler_did: row.get(2)?,
      payload:     row.get(3)?,
      ctime:       row.get(4)?,
      expired_at:  row.get(5)?,
    })
  }

  pub fn into_label(self) -> Result<ActiveLabel> {
    Ok(ActiveLabel {
      label_id:    self.label_id,
      subject_uri: self.subject_uri,
      labeler_did: self.labeler_did,
      payload:     serde_json::from_str(&self.payload)?,
      ctime:       decode_dt(&self.ctime)?,
      expired_at:  self.expired_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawHistoryEntry {
  pub author_did:          String,
  pub fingerprint:         String,
  pub fingerprint_version: String,
  pub created_at:          String,
  pub confidence:          Option<f64>,
  pub provenance:          String,
  pub evidence_hash:       String,
  pub post_uri:            String,
  pub post_cid:            Option<String>,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<ClaimHistoryEntry> {
    Ok(ClaimHistoryEntry {
      author_did:    self.author_did,
      fingerprint:   Fingerprint::new(self.fingerprint, self.fingerprint_version),
      created_at:    decode_dt(&self.created_at)?,
      confidence:    self.confidence,
      provenance:    self.provenance,
      evidence_hash: self.evidence_hash,
      post_uri:      self.post_uri,
      post_cid:      self.post_cid,
    })
  }
}

pub struct RawDecision {
  pub decision_id:         String,
  pub created_at:          String,
  pub subject_uri:         String,
  pub root_uri:            Option<String>,
  pub label:               String,
  pub rule_id:             String,
  pub fingerprint_version: String,
  pub inputs:              String,
  pub evidence_hashes:     String,
  pub decision_trace:      String,
  pub config_hash:         String,
  pub status:              String,
}

pub const DECISION_COLUMNS: &str = "decision_id, created_at, subject_uri, root_uri, label, \
  rule_id, fingerprint_version, inputs, evidence_hashes, decision_trace, config_hash, status";

impl RawDecision {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      decision_id:         row.get(0)?,
      created_at:          row.get(1)?,
      subject_uri:         row.get(2)?,
      root_uri:            row.get(3)?,
      label:               row.get(4)?,
      rule_id:             row.get(5)?,
      fingerprint_version: row.get(6)?,
      inputs:              row.get(7)?,
      evidence_hashes:     row.get(8)?,
      decision_trace:      row.get(9)?,
      config_hash:         row.get(10)?,
      status:              row.get(11)?,
    })
  }

  pub fn into_decision(self) -> Result<LabelDecision> {
    Ok(LabelDecision {
      decision_id:         decode_uuid(&self.decision_id)?,
      created_at:          decode_dt(&self.created_at)?,
      subject_uri:         self.subject_uri,
      root_uri:            self.root_uri,
      label:               self.label,
      rule_id:             self.rule_id,
      fingerprint_version: self.fingerprint_version,
      inputs:              serde_json::from_str(&self.inputs)?,
      evidence_hashes:     serde_json::from_str(&self.evidence_hashes)?,
      decision_trace:      serde_json::from_str(&self.decision_trace)?,
      config_hash:         self.config_hash,
      status:              decode_variant::<DecisionStatus>("decision status", &self.status)?,
    })
  }
}

pub struct RawQuarantineEmit {
  pub emit_id:     String,
  pub created_at:  String,
  pub emit_mode:   String,
  pub emit_status: String,
  pub emit_reason: Option<String>,
  pub payload:     String,
}

pub const QUARANTINE_COLUMNS: &str =
  "emit_id, created_at, emit_mode, emit_status, emit_reason, payload";

impl RawQuarantineEmit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      emit_id:     row.get(0)?,
      created_at:  row.get(1)?,
      emit_mode:   row.get(2)?,
      emit_status: row.get(3)?,
      emit_reason: row.get(4)?,
      payload:     row.get(5)?,
    })
  }

  pub fn into_emit(self) -> Result<QuarantineEmit> {
    Ok(QuarantineEmit {
      emit_id:     decode_uuid(&self.emit_id)?,
      created_at:  decode_dt(&self.created_at)?,
      emit_mode:   decode_variant::<EmitMode>("emit mode", &self.emit_mode)?,
      emit_status: decode_variant::<EmitStatus>("emit status", &self.emit_status)?,
      emit_reason: self.emit_reason,
      payload:     serde_json::from_str(&self.payload)?,
    })
  }
}
