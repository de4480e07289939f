//! Ingestion: persist a post and schedule the re-evaluation it calls for.

use chrono::{DateTime, Utc};
use claimdrift_claims::claim_history_entry;
use claimdrift_core::{
  post::Post,
  recheck::RecheckKey,
  store::{ClaimHistoryStore, EventStore, EventWrite, PendingQueue},
};

use crate::{Error, RecheckConfig, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
  pub write:       EventWrite,
  /// The claim group enqueued because the author already made this claim
  /// in another post.
  pub claim_group: Option<RecheckKey>,
}

/// Store `post` and, if it is new or changed, enqueue its thread and record
/// its claim in the author's history. `observed_at` stamps the archived copy
/// when the post replaces an earlier version.
pub async fn ingest_post<S, Q>(
  store: &S,
  queue: &Q,
  config: &RecheckConfig,
  post: &Post,
  observed_at: DateTime<Utc>,
) -> Result<IngestOutcome>
where
  S: EventStore + ClaimHistoryStore,
  Q: PendingQueue,
{
  let write = store.record_post(post, observed_at).await.map_err(Error::store)?;
  let mut outcome = IngestOutcome { write, claim_group: None };
  if !write.changed() {
    tracing::debug!(uri = %post.uri, "unchanged replay ignored");
    return Ok(outcome);
  }

  queue
    .enqueue(RecheckKey::thread(post.thread_root()))
    .await
    .map_err(Error::queue)?;

  if post.text.is_empty() {
    return Ok(outcome);
  }

  let entry = claim_history_entry(post, &config.rules.fingerprint, post.created_at);

  if config.claim_recheck.enabled {
    let history = store
      .claim_history(&entry.author_did, &entry.fingerprint)
      .await
      .map_err(Error::store)?;
    if history.iter().any(|e| e.post_uri != post.uri) {
      let key = RecheckKey::claim_group(&entry.author_did, &entry.fingerprint.value);
      queue.enqueue(key.clone()).await.map_err(Error::queue)?;
      outcome.claim_group = Some(key);
    }
  }

  store.append_claim(&entry).await.map_err(Error::store)?;
  tracing::debug!(uri = %post.uri, fingerprint = %entry.fingerprint, ?write, "post ingested");
  Ok(outcome)
}
