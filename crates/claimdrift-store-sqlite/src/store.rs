//! [`SqliteStore`], the SQLite implementation of the event, label, claim
//! history and ledger stores.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension as _};
use serde_json::Value;
use uuid::Uuid;

use claimdrift_core::{
  claim::{ClaimHistoryEntry, Fingerprint},
  json::canonical_value_string,
  label::ActiveLabel,
  ledger::{DecisionStatus, LabelDecision, NewLabelDecision, NewQuarantineEmit, QuarantineEmit},
  post::Post,
  store::{
    Backend, ClaimHistoryStore, EventStore, EventWrite, LabelStore, LedgerStore, PostVersion,
  },
};

use crate::{
  encode::{
    decode_post, encode_dt, encode_json, encode_uuid, RawDecision, RawHistoryEntry, RawLabel,
    RawQuarantineEmit, RawVersion, DECISION_COLUMNS, LABEL_COLUMNS, QUARANTINE_COLUMNS,
  },
  queue::SqliteQueue,
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A claim-drift store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// A pending-recheck queue sharing this store's connection.
  pub fn queue(&self) -> SqliteQueue { SqliteQueue::new(self) }
}

/// Decode stored post payloads, skipping (and logging) rows that no longer
/// parse so one bad row cannot stall a whole thread.
fn decode_posts(rows: Vec<(String, String)>) -> Vec<Post> {
  rows
    .into_iter()
    .filter_map(|(uri, raw)| match decode_post(&raw) {
      Ok(post) => Some(post),
      Err(e) => {
        tracing::warn!(%uri, error = %e, "skipping malformed stored post");
        None
      }
    })
    .collect()
}

fn clamp_limit(limit: usize) -> i64 { i64::try_from(limit).unwrap_or(i64::MAX) }

impl Backend for SqliteStore {
  type Error = Error;
}

// ─── Events ──────────────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  async fn record_post(&self, post: &Post, observed_at: DateTime<Utc>) -> Result<EventWrite> {
    let raw        = encode_json(post)?;
    let uri        = post.uri.clone();
    let author_did = post.author_did.clone();
    let created_at = encode_dt(post.created_at);
    let root_uri   = post.reply_root_uri.clone();
    let parent_uri = post.reply_parent_uri.clone();
    let now        = encode_dt(observed_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let existing: Option<String> = tx
          .query_row("SELECT raw_json FROM events WHERE uri = ?1", params![uri], |r| r.get(0))
          .optional()?;

        let outcome = match existing {
          None => {
            tx.execute(
              "INSERT INTO events
                 (uri, author_did, created_at, root_uri, parent_uri, raw_json, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
              params![uri, author_did, created_at, root_uri, parent_uri, raw, now],
            )?;
            EventWrite::Inserted
          }
          Some(old) if old == raw => EventWrite::Unchanged,
          Some(old) => {
            tx.execute(
              "INSERT INTO event_versions (uri, archived_at, raw_json) VALUES (?1, ?2, ?3)",
              params![uri, now, old],
            )?;
            tx.execute(
              "UPDATE events
                  SET author_did = ?2, created_at = ?3, root_uri = ?4, parent_uri = ?5,
                      raw_json = ?6, updated_at = ?7
                WHERE uri = ?1",
              params![uri, author_did, created_at, root_uri, parent_uri, raw, now],
            )?;
            EventWrite::Updated
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  async fn get_post(&self, uri: &str) -> Result<Option<Post>> {
    let uri = uri.to_owned();
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row("SELECT raw_json FROM events WHERE uri = ?1", params![uri], |r| r.get(0))
            .optional()?,
        )
      })
      .await?;

    raw.as_deref().map(decode_post).transpose()
  }

  async fn post_versions(&self, uri: &str) -> Result<Vec<PostVersion>> {
    let uri = uri.to_owned();
    let raws: Vec<RawVersion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT archived_at, raw_json FROM event_versions
            WHERE uri = ?1 ORDER BY version_id",
        )?;
        let rows = stmt
          .query_map(params![uri], |r| {
            Ok(RawVersion { archived_at: r.get(0)?, raw_json: r.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVersion::into_version).collect()
  }

  async fn load_posts_for_root(&self, root_uri: &str) -> Result<Vec<Post>> {
    let root = root_uri.to_owned();
    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT uri, raw_json FROM events
            WHERE uri = ?1 OR root_uri = ?1 OR parent_uri = ?1
            ORDER BY created_at, uri",
        )?;
        let rows = stmt
          .query_map(params![root], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_posts(rows))
  }

  async fn load_posts_for_claim_group(
    &self,
    author_did: &str,
    fingerprint: &Fingerprint,
  ) -> Result<Vec<Post>> {
    let author  = author_did.to_owned();
    let value   = fingerprint.value.clone();
    let version = fingerprint.version.clone();
    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT e.uri, e.raw_json FROM events e
            WHERE e.uri IN (
                    SELECT post_uri FROM claim_history
                     WHERE author_did = ?1 AND fingerprint = ?2 AND fingerprint_version = ?3
                  )
            ORDER BY e.created_at, e.uri",
        )?;
        let rows = stmt
          .query_map(params![author, value, version], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(decode_posts(rows))
  }
}

// ─── Labels ──────────────────────────────────────────────────────────────────

impl SqliteStore {
  async fn select_labels(&self, subject_uri: &str, active_only: bool) -> Result<Vec<ActiveLabel>> {
    let subject = subject_uri.to_owned();
    let sql = format!(
      "SELECT {LABEL_COLUMNS} FROM labels WHERE subject_uri = ?1 {} ORDER BY label_id",
      if active_only { "AND expired_at IS NULL" } else { "" },
    );
    let raws: Vec<RawLabel> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![subject], RawLabel::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLabel::into_label).collect()
  }
}

impl LabelStore for SqliteStore {
  async fn active_labels(&self, subject_uri: &str) -> Result<Vec<ActiveLabel>> {
    self.select_labels(subject_uri, true).await
  }

  async fn labels_for_subject(&self, subject_uri: &str) -> Result<Vec<ActiveLabel>> {
    self.select_labels(subject_uri, false).await
  }

  async fn insert_label(
    &self,
    subject_uri: &str,
    labeler_did: &str,
    payload: &Value,
  ) -> Result<bool> {
    let subject = subject_uri.to_owned();
    let labeler = labeler_did.to_owned();
    let name    = payload.get("label").and_then(Value::as_str).map(str::to_owned);
    let body    = canonical_value_string(payload);
    let ctime   = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO labels (subject_uri, labeler_did, label_name, payload, ctime)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![subject, labeler, name, body, ctime],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(inserted)
  }

  async fn expire_label(
    &self,
    subject_uri: &str,
    labeler_did: &str,
    payload: &Value,
  ) -> Result<usize> {
    let subject = subject_uri.to_owned();
    let labeler = labeler_did.to_owned();
    let body    = canonical_value_string(payload);
    let now     = encode_dt(Utc::now());

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE labels SET expired_at = ?4
            WHERE subject_uri = ?1 AND labeler_did = ?2 AND payload = ?3
              AND expired_at IS NULL",
          params![subject, labeler, body, now],
        )?)
      })
      .await?;

    Ok(n)
  }

  async fn expire_labels_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<ActiveLabel>> {
    let cutoff = encode_dt(cutoff);
    let now    = encode_dt(Utc::now());

    let raws: Vec<RawLabel> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {LABEL_COLUMNS} FROM labels
              WHERE expired_at IS NULL AND ctime <= ?1 ORDER BY label_id"
          ))?;
          let rows = stmt
            .query_map(params![cutoff], RawLabel::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };
        for row in &mut rows {
          tx.execute(
            "UPDATE labels SET expired_at = ?2 WHERE label_id = ?1",
            params![row.label_id, now],
          )?;
          row.expired_at = Some(now.clone());
        }
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLabel::into_label).collect()
  }
}

// ─── Claim history ───────────────────────────────────────────────────────────

impl ClaimHistoryStore for SqliteStore {
  async fn append_claim(&self, entry: &ClaimHistoryEntry) -> Result<()> {
    let e = entry.clone();
    let created_at = encode_dt(e.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO claim_history
             (author_did, fingerprint, fingerprint_version, created_at, confidence,
              provenance, evidence_hash, post_uri, post_cid)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params![
            e.author_did,
            e.fingerprint.value,
            e.fingerprint.version,
            created_at,
            e.confidence,
            e.provenance,
            e.evidence_hash,
            e.post_uri,
            e.post_cid,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn claim_history(
    &self,
    author_did: &str,
    fingerprint: &Fingerprint,
  ) -> Result<Vec<ClaimHistoryEntry>> {
    let author  = author_did.to_owned();
    let value   = fingerprint.value.clone();
    let version = fingerprint.version.clone();

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT author_did, fingerprint, fingerprint_version, created_at, confidence,
                  provenance, evidence_hash, post_uri, post_cid
             FROM claim_history
            WHERE author_did = ?1 AND fingerprint = ?2 AND fingerprint_version = ?3
            ORDER BY created_at, history_id",
        )?;
        let rows = stmt
          .query_map(params![author, value, version], |r| {
            Ok(RawHistoryEntry {
              author_did:          r.get(0)?,
              fingerprint:         r.get(1)?,
              fingerprint_version: r.get(2)?,
              created_at:          r.get(3)?,
              confidence:          r.get(4)?,
              provenance:          r.get(5)?,
              evidence_hash:       r.get(6)?,
              post_uri:            r.get(7)?,
              post_cid:            r.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

impl SqliteStore {
  async fn select_decisions(&self, clause: &'static str, arg: String) -> Result<Vec<LabelDecision>> {
    let sql = format!("SELECT {DECISION_COLUMNS} FROM label_decisions {clause}");
    let raws: Vec<RawDecision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![arg], RawDecision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDecision::into_decision).collect()
  }
}

impl LedgerStore for SqliteStore {
  async fn append_decision(&self, input: NewLabelDecision) -> Result<LabelDecision> {
    let decision = LabelDecision {
      decision_id:         Uuid::new_v4(),
      created_at:          Utc::now(),
      subject_uri:         input.subject_uri,
      root_uri:            input.root_uri,
      label:               input.label,
      rule_id:             input.rule_id,
      fingerprint_version: input.fingerprint_version,
      inputs:              input.inputs,
      evidence_hashes:     input.evidence_hashes,
      decision_trace:      input.decision_trace,
      config_hash:         input.config_hash,
      status:              DecisionStatus::Committed,
    };

    let id          = encode_uuid(decision.decision_id);
    let created_at  = encode_dt(decision.created_at);
    let subject     = decision.subject_uri.clone();
    let root        = decision.root_uri.clone();
    let label       = decision.label.clone();
    let rule_id     = decision.rule_id.clone();
    let fp_version  = decision.fingerprint_version.clone();
    let inputs      = encode_json(&decision.inputs)?;
    let hashes      = encode_json(&decision.evidence_hashes)?;
    let trace       = encode_json(&decision.decision_trace)?;
    let config_hash = decision.config_hash.clone();
    let status      = decision.status.to_string();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO label_decisions
             (decision_id, created_at, subject_uri, root_uri, label, rule_id,
              fingerprint_version, inputs, evidence_hashes, decision_trace, config_hash, status)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          params![
            id, created_at, subject, root, label, rule_id, fp_version, inputs, hashes, trace,
            config_hash, status,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(decision)
  }

  async fn mark_expired(&self, subject_uri: &str, label: &str) -> Result<usize> {
    let subject = subject_uri.to_owned();
    let label   = label.to_owned();

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE label_decisions SET status = 'expired'
            WHERE subject_uri = ?1 AND label = ?2 AND status = 'committed'",
          params![subject, label],
        )?)
      })
      .await?;

    Ok(n)
  }

  async fn decisions_for_subject(&self, subject_uri: &str) -> Result<Vec<LabelDecision>> {
    self
      .select_decisions(
        "WHERE subject_uri = ?1 ORDER BY created_at, decision_id",
        subject_uri.to_owned(),
      )
      .await
  }

  async fn recent_decisions(&self, limit: usize) -> Result<Vec<LabelDecision>> {
    let limit = clamp_limit(limit);
    let sql = format!(
      "SELECT {DECISION_COLUMNS} FROM label_decisions
        ORDER BY created_at DESC, decision_id DESC LIMIT ?1"
    );
    let raws: Vec<RawDecision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![limit], RawDecision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDecision::into_decision).collect()
  }

  async fn rule_counts_since(&self, since: DateTime<Utc>) -> Result<BTreeMap<String, u64>> {
    let since = encode_dt(since);

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT rule_id, COUNT(*) FROM label_decisions
            WHERE created_at >= ?1 GROUP BY rule_id",
        )?;
        let rows = stmt
          .query_map(params![since], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(rule, n)| (rule, u64::try_from(n).unwrap_or(0)))
        .collect(),
    )
  }

  async fn append_quarantine_emit(&self, input: NewQuarantineEmit) -> Result<QuarantineEmit> {
    let emit = QuarantineEmit {
      emit_id:     Uuid::new_v4(),
      created_at:  Utc::now(),
      emit_mode:   input.emit_mode,
      emit_status: input.emit_status,
      emit_reason: input.emit_reason,
      payload:     input.payload,
    };

    let id      = encode_uuid(emit.emit_id);
    let created = encode_dt(emit.created_at);
    let mode    = emit.emit_mode.to_string();
    let status  = emit.emit_status.to_string();
    let reason  = emit.emit_reason.clone();
    let payload = canonical_value_string(&emit.payload);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO quarantine_emits
             (emit_id, created_at, emit_mode, emit_status, emit_reason, payload)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![id, created, mode, status, reason, payload],
        )?;
        Ok(())
      })
      .await?;

    Ok(emit)
  }

  async fn list_quarantine_emits(&self, limit: usize) -> Result<Vec<QuarantineEmit>> {
    let limit = clamp_limit(limit);
    let sql = format!(
      "SELECT {QUARANTINE_COLUMNS} FROM quarantine_emits
        ORDER BY created_at DESC, emit_id DESC LIMIT ?1"
    );
    let raws: Vec<RawQuarantineEmit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![limit], RawQuarantineEmit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuarantineEmit::into_emit).collect()
  }

  async fn get_quarantine_emit(&self, emit_id: Uuid) -> Result<Option<QuarantineEmit>> {
    let id  = encode_uuid(emit_id);
    let sql = format!("SELECT {QUARANTINE_COLUMNS} FROM quarantine_emits WHERE emit_id = ?1");

    let raw: Option<RawQuarantineEmit> = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, params![id], RawQuarantineEmit::from_row).optional()?)
      })
      .await?;

    raw.map(RawQuarantineEmit::into_emit).transpose()
  }
}
