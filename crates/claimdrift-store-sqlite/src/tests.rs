//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use claimdrift_core::{
  claim::{ClaimHistoryEntry, Fingerprint},
  emit::{EmitMode, EmitStatus},
  label::{Evidence, SchedulerKind},
  ledger::{DecisionInputs, DecisionStatus, DecisionTrace, NewLabelDecision, NewQuarantineEmit},
  post::Post,
  recheck::{RecheckKey, RecheckKind},
  store::{ClaimHistoryStore, EventStore, EventWrite, LabelStore, LedgerStore, PendingQueue},
};
use serde_json::json;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap() }

fn post(uri: &str, root: Option<&str>, minutes: i64, text: &str) -> Post {
  Post {
    uri:              uri.into(),
    cid:              None,
    text:             text.into(),
    created_at:       t0() + Duration::minutes(minutes),
    author_did:       "did:plc:alice".into(),
    reply_parent_uri: root.map(str::to_owned),
    reply_root_uri:   root.map(str::to_owned),
    facets:           vec![],
    embeds:           vec![],
    external_links:   vec![],
  }
}

fn decision(subject: &str, label: &str) -> NewLabelDecision {
  NewLabelDecision {
    subject_uri:         subject.into(),
    root_uri:            Some("at://a/1".into()),
    label:               label.into(),
    rule_id:             label.into(),
    fingerprint_version: "v1".into(),
    inputs:              DecisionInputs::default(),
    evidence_hashes:     vec!["abc".into()],
    decision_trace:      DecisionTrace {
      reasons:   vec!["because".into()],
      evidence:  vec![Evidence::post(subject)],
      scheduler: SchedulerKind::ThreadRoot,
    },
    config_hash:         "cfg".into(),
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_post_inserts_then_ignores_replays() {
  let s = store().await;
  let p = post("at://a/1", None, 0, "100 people were evacuated.");

  assert_eq!(s.record_post(&p, t0()).await.unwrap(), EventWrite::Inserted);
  assert_eq!(s.record_post(&p, t0()).await.unwrap(), EventWrite::Unchanged);
  assert!(s.post_versions("at://a/1").await.unwrap().is_empty());
  assert_eq!(s.get_post("at://a/1").await.unwrap(), Some(p));
}

#[tokio::test]
async fn edits_archive_the_previous_payload() {
  let s = store().await;
  let original = post("at://a/1", None, 0, "100 people were evacuated.");
  let mut edited = original.clone();
  edited.text = "300 people were evacuated.".into();

  s.record_post(&original, t0()).await.unwrap();
  let write = s.record_post(&edited, t0() + Duration::minutes(5)).await.unwrap();
  assert_eq!(write, EventWrite::Updated);

  let current = s.get_post("at://a/1").await.unwrap().unwrap();
  assert_eq!(current.text, edited.text);

  let versions = s.post_versions("at://a/1").await.unwrap();
  assert_eq!(versions.len(), 1);
  assert_eq!(versions[0].post.text, original.text);
}

#[tokio::test]
async fn get_post_missing_returns_none() {
  let s = store().await;
  assert!(s.get_post("at://nope").await.unwrap().is_none());
}

#[tokio::test]
async fn thread_loads_root_and_replies_in_order() {
  let s = store().await;
  s.record_post(&post("at://a/3", Some("at://a/1"), 20, "third"), t0()).await.unwrap();
  s.record_post(&post("at://a/1", None, 0, "root"), t0()).await.unwrap();
  s.record_post(&post("at://a/2", Some("at://a/1"), 10, "second"), t0()).await.unwrap();
  s.record_post(&post("at://b/1", None, 5, "elsewhere"), t0()).await.unwrap();

  let thread = s.load_posts_for_root("at://a/1").await.unwrap();
  let uris: Vec<_> = thread.iter().map(|p| p.uri.as_str()).collect();
  assert_eq!(uris, ["at://a/1", "at://a/2", "at://a/3"]);
}

// ─── Labels ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_active_payloads_are_stored_once() {
  let s = store().await;
  let payload = json!({ "label": "repeat_claim", "score": 0.6 });

  assert!(s.insert_label("at://a/2", "did:labeler:drift", &payload).await.unwrap());
  assert!(!s.insert_label("at://a/2", "did:labeler:drift", &payload).await.unwrap());

  let active = s.active_labels("at://a/2").await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].name(), Some("repeat_claim"));
}

#[tokio::test]
async fn payload_identity_ignores_key_order() {
  let s = store().await;
  let a = json!({ "label": "x", "score": 0.5 });
  let b = json!({ "score": 0.5, "label": "x" });

  assert!(s.insert_label("at://a/2", "did:l", &a).await.unwrap());
  assert!(!s.insert_label("at://a/2", "did:l", &b).await.unwrap());
}

#[tokio::test]
async fn expired_payload_can_be_reinserted() {
  let s = store().await;
  let payload = json!({ "label": "repeat_claim" });

  s.insert_label("at://a/2", "did:l", &payload).await.unwrap();
  assert_eq!(s.expire_label("at://a/2", "did:l", &payload).await.unwrap(), 1);
  assert_eq!(s.expire_label("at://a/2", "did:l", &payload).await.unwrap(), 0);
  assert!(s.active_labels("at://a/2").await.unwrap().is_empty());

  assert!(s.insert_label("at://a/2", "did:l", &payload).await.unwrap());
  let all = s.labels_for_subject("at://a/2").await.unwrap();
  assert_eq!(all.len(), 2);
  assert!(!all[0].is_active());
  assert!(all[1].is_active());
}

#[tokio::test]
async fn expire_labels_before_returns_expired_rows() {
  let s = store().await;
  s.insert_label("at://a/2", "did:l", &json!({ "label": "a" })).await.unwrap();
  s.insert_label("at://a/3", "did:l", &json!({ "label": "b" })).await.unwrap();

  let none = s.expire_labels_before(Utc::now() - Duration::days(1)).await.unwrap();
  assert!(none.is_empty());

  let expired = s.expire_labels_before(Utc::now() + Duration::seconds(1)).await.unwrap();
  assert_eq!(expired.len(), 2);
  assert!(expired.iter().all(|l| l.expired_at.is_some()));
  assert!(s.active_labels("at://a/2").await.unwrap().is_empty());
}

// ─── Claim history ───────────────────────────────────────────────────────────

#[tokio::test]
async fn claim_history_is_scoped_by_version() {
  let s = store().await;
  let v1 = Fingerprint::new("0123456789abcdef", "v1");
  let v2 = Fingerprint::new("0123456789abcdef", "v2");

  for (uri, minutes, fp) in [("at://a/2", 10, &v1), ("at://a/1", 0, &v1), ("at://a/9", 5, &v2)] {
    s.append_claim(&ClaimHistoryEntry {
      author_did:    "did:plc:alice".into(),
      fingerprint:   fp.clone(),
      created_at:    t0() + Duration::minutes(minutes),
      confidence:    Some(0.5),
      provenance:    String::new(),
      evidence_hash: "h".into(),
      post_uri:      uri.into(),
      post_cid:      None,
    })
    .await
    .unwrap();
  }

  let history = s.claim_history("did:plc:alice", &v1).await.unwrap();
  let uris: Vec<_> = history.iter().map(|e| e.post_uri.as_str()).collect();
  assert_eq!(uris, ["at://a/1", "at://a/2"]);
  assert_eq!(history[0].fingerprint, v1);
}

#[tokio::test]
async fn claim_group_posts_are_deduplicated() {
  let s = store().await;
  let fp = Fingerprint::new("feedfacefeedface", "v1");
  let p1 = post("at://a/1", None, 0, "100 people were evacuated.");
  let p2 = post("at://b/1", None, 60, "100 people were evacuated.");
  for p in [&p1, &p2] {
    s.record_post(p, t0()).await.unwrap();
  }
  for p in [&p1, &p2, &p2] {
    s.append_claim(&ClaimHistoryEntry {
      author_did:    p.author_did.clone(),
      fingerprint:   fp.clone(),
      created_at:    p.created_at,
      confidence:    None,
      provenance:    String::new(),
      evidence_hash: String::new(),
      post_uri:      p.uri.clone(),
      post_cid:      None,
    })
    .await
    .unwrap();
  }

  let posts = s.load_posts_for_claim_group("did:plc:alice", &fp).await.unwrap();
  assert_eq!(posts, vec![p1, p2]);
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn decisions_move_from_committed_to_expired() {
  let s = store().await;
  let d = s.append_decision(decision("at://a/2", "repeat_claim")).await.unwrap();
  assert_eq!(d.status, DecisionStatus::Committed);

  assert_eq!(s.mark_expired("at://a/2", "repeat_claim").await.unwrap(), 1);
  assert_eq!(s.mark_expired("at://a/2", "repeat_claim").await.unwrap(), 0);

  let stored = s.decisions_for_subject("at://a/2").await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].decision_id, d.decision_id);
  assert_eq!(stored[0].status, DecisionStatus::Expired);
  assert_eq!(stored[0].decision_trace, d.decision_trace);
}

#[tokio::test]
async fn rule_counts_respect_the_window() {
  let s = store().await;
  let before = Utc::now() - Duration::seconds(1);
  s.append_decision(decision("at://a/2", "repeat_claim")).await.unwrap();
  s.append_decision(decision("at://a/3", "repeat_claim")).await.unwrap();
  s.append_decision(decision("at://a/3", "quote_mismatch")).await.unwrap();

  let counts = s.rule_counts_since(before).await.unwrap();
  assert_eq!(counts.get("repeat_claim"), Some(&2));
  assert_eq!(counts.get("quote_mismatch"), Some(&1));

  let later = s.rule_counts_since(Utc::now() + Duration::hours(1)).await.unwrap();
  assert!(later.is_empty());

  assert_eq!(s.recent_decisions(2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn quarantine_emits_round_trip() {
  let s = store().await;
  let emit = s
    .append_quarantine_emit(NewQuarantineEmit {
      emit_mode:   EmitMode::Quarantine,
      emit_status: EmitStatus::Suppressed,
      emit_reason: Some("emit_cap_reached:1".into()),
      payload:     json!({ "label": "repeat_claim" }),
    })
    .await
    .unwrap();

  let fetched = s.get_quarantine_emit(emit.emit_id).await.unwrap().unwrap();
  assert_eq!(fetched.emit_mode, EmitMode::Quarantine);
  assert_eq!(fetched.emit_reason.as_deref(), Some("emit_cap_reached:1"));
  assert_eq!(fetched.payload, emit.payload);

  assert_eq!(s.list_quarantine_emits(10).await.unwrap().len(), 1);
  assert!(s.get_quarantine_emit(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn queue_deduplicates_and_reorders_on_reenqueue() {
  let s = store().await;
  let q = s.queue();
  q.enqueue(RecheckKey::thread("at://r/1")).await.unwrap();
  q.enqueue(RecheckKey::thread("at://r/2")).await.unwrap();
  q.enqueue(RecheckKey::thread("at://r/1")).await.unwrap();
  q.enqueue(RecheckKey::claim_group("did:plc:alice", "fp")).await.unwrap();

  assert_eq!(q.pending(RecheckKind::Thread).await.unwrap(), 2);
  assert_eq!(q.pending(RecheckKind::ClaimGroup).await.unwrap(), 1);

  let first = q.dequeue(RecheckKind::Thread, 1).await.unwrap();
  assert_eq!(first, vec![RecheckKey::thread("at://r/2")]);

  let rest = q.dequeue(RecheckKind::Thread, 10).await.unwrap();
  assert_eq!(rest, vec![RecheckKey::thread("at://r/1")]);
  assert_eq!(q.pending(RecheckKind::Thread).await.unwrap(), 0);

  let groups = q.dequeue(RecheckKind::ClaimGroup, 10).await.unwrap();
  assert_eq!(groups, vec![RecheckKey::claim_group("did:plc:alice", "fp")]);
}
