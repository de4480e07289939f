//! Storage and queue traits.
//!
//! Backends (e.g. `claimdrift-store-sqlite`) implement these; the scheduler
//! and ingestion helpers depend only on the traits. All methods return `Send`
//! futures so they can be driven from a multi-threaded tokio runtime.

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  claim::{ClaimHistoryEntry, Fingerprint},
  label::ActiveLabel,
  ledger::{LabelDecision, NewLabelDecision, NewQuarantineEmit, QuarantineEmit},
  post::Post,
  recheck::{RecheckKey, RecheckKind},
};

// ─── Shared ──────────────────────────────────────────────────────────────────

/// The error type shared by every store trait of one backend.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

/// Outcome of [`EventStore::record_post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventWrite {
  /// First time this `uri` was seen.
  Inserted,
  /// The `uri` existed with a different payload; the old one was archived.
  Updated,
  /// Byte-identical replay of the stored payload.
  Unchanged,
}

impl EventWrite {
  pub fn changed(self) -> bool { !matches!(self, EventWrite::Unchanged) }
}

/// A superseded payload of an edited post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostVersion {
  pub archived_at: DateTime<Utc>,
  pub post:        Post,
}

// ─── Events ──────────────────────────────────────────────────────────────────

pub trait EventStore: Backend {
  /// Store `post`, archiving any previous differing payload.
  fn record_post<'a>(
    &'a self,
    post: &'a Post,
    observed_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<EventWrite, Self::Error>> + Send + 'a;

  fn get_post<'a>(
    &'a self,
    uri: &'a str,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + 'a;

  /// Earlier payloads of an edited post, oldest first.
  fn post_versions<'a>(
    &'a self,
    uri: &'a str,
  ) -> impl Future<Output = Result<Vec<PostVersion>, Self::Error>> + Send + 'a;

  /// The root post and every post replying to it, oldest first.
  fn load_posts_for_root<'a>(
    &'a self,
    root_uri: &'a str,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + 'a;

  /// Every post recorded in the claim history of `(author_did, fingerprint)`,
  /// oldest first, each at most once.
  fn load_posts_for_claim_group<'a>(
    &'a self,
    author_did: &'a str,
    fingerprint: &'a Fingerprint,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + 'a;
}

// ─── Labels ──────────────────────────────────────────────────────────────────

pub trait LabelStore: Backend {
  /// Non-expired labels on `subject_uri`, oldest first.
  fn active_labels<'a>(
    &'a self,
    subject_uri: &'a str,
  ) -> impl Future<Output = Result<Vec<ActiveLabel>, Self::Error>> + Send + 'a;

  /// Every label ever written on `subject_uri`, expired ones included.
  fn labels_for_subject<'a>(
    &'a self,
    subject_uri: &'a str,
  ) -> impl Future<Output = Result<Vec<ActiveLabel>, Self::Error>> + Send + 'a;

  /// Insert a label. Returns `false` when an active label with the exact
  /// same payload already exists.
  fn insert_label<'a>(
    &'a self,
    subject_uri: &'a str,
    labeler_did: &'a str,
    payload: &'a Value,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Expire active labels matching the exact payload; returns the count.
  fn expire_label<'a>(
    &'a self,
    subject_uri: &'a str,
    labeler_did: &'a str,
    payload: &'a Value,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Expire every active label created at or before `cutoff` and return them.
  fn expire_labels_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<ActiveLabel>, Self::Error>> + Send + '_;
}

// ─── Claim history ───────────────────────────────────────────────────────────

pub trait ClaimHistoryStore: Backend {
  fn append_claim<'a>(
    &'a self,
    entry: &'a ClaimHistoryEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Entries for `(author_did, fingerprint)` of the same fingerprint version,
  /// ordered by `created_at`.
  fn claim_history<'a>(
    &'a self,
    author_did: &'a str,
    fingerprint: &'a Fingerprint,
  ) -> impl Future<Output = Result<Vec<ClaimHistoryEntry>, Self::Error>> + Send + 'a;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

pub trait LedgerStore: Backend {
  /// Append a `committed` decision. Id and timestamp are set by the store.
  fn append_decision(
    &self,
    input: NewLabelDecision,
  ) -> impl Future<Output = Result<LabelDecision, Self::Error>> + Send + '_;

  /// Move committed decisions for `(subject_uri, label)` to `expired`.
  fn mark_expired<'a>(
    &'a self,
    subject_uri: &'a str,
    label: &'a str,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  fn decisions_for_subject<'a>(
    &'a self,
    subject_uri: &'a str,
  ) -> impl Future<Output = Result<Vec<LabelDecision>, Self::Error>> + Send + 'a;

  /// Newest first.
  fn recent_decisions(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<LabelDecision>, Self::Error>> + Send + '_;

  /// Decision counts per `rule_id` created at or after `since`.
  fn rule_counts_since(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<BTreeMap<String, u64>, Self::Error>> + Send + '_;

  fn append_quarantine_emit(
    &self,
    input: NewQuarantineEmit,
  ) -> impl Future<Output = Result<QuarantineEmit, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_quarantine_emits(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<QuarantineEmit>, Self::Error>> + Send + '_;

  fn get_quarantine_emit(
    &self,
    emit_id: Uuid,
  ) -> impl Future<Output = Result<Option<QuarantineEmit>, Self::Error>> + Send + '_;
}

/// Everything the recheck scheduler needs from one backend.
pub trait DriftStore: EventStore + LabelStore + ClaimHistoryStore + LedgerStore {}

impl<T> DriftStore for T where T: EventStore + LabelStore + ClaimHistoryStore + LedgerStore {}

// ─── Queue ───────────────────────────────────────────────────────────────────

/// Pending re-evaluation requests, ordered by schedule time.
pub trait PendingQueue: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert `key`, or move it to the back of the queue if already pending.
  fn enqueue(
    &self,
    key: RecheckKey,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Atomically remove and return up to `limit` of the oldest requests of
  /// `kind`.
  fn dequeue(
    &self,
    kind: RecheckKind,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RecheckKey>, Self::Error>> + Send + '_;

  fn pending(
    &self,
    kind: RecheckKind,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
