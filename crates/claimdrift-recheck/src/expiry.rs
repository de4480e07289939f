//! Time-to-live sweep over active labels.

use chrono::{DateTime, Utc};
use claimdrift_core::{
  label::ActiveLabel,
  store::{LabelStore, LedgerStore},
};

use crate::{
  Error, Result,
  config::{DEFAULT_TTL_DAYS, days_before},
};

/// Expire every active label created at or before `now - ttl_days` and move
/// the matching ledger decisions to `expired`. Returns the expired labels.
///
/// A TTL that is not positive, or too large to subtract from `now`, is
/// replaced by the default.
pub async fn expire_stale_labels<S>(store: &S, ttl_days: i64, now: DateTime<Utc>) -> Result<Vec<ActiveLabel>>
where
  S: LabelStore + LedgerStore,
{
  let cutoff = days_before(now, ttl_days).unwrap_or_else(|| {
    tracing::warn!(value = ttl_days, "label TTL out of range; using {DEFAULT_TTL_DAYS} days");
    days_before(now, DEFAULT_TTL_DAYS).unwrap_or(DateTime::<Utc>::MIN_UTC)
  });
  let expired = store.expire_labels_before(cutoff).await.map_err(Error::store)?;

  for label in &expired {
    let Some(name) = label.name() else { continue };
    if let Err(e) = store.mark_expired(&label.subject_uri, name).await {
      tracing::warn!(subject = %label.subject_uri, label = name, error = %e, "failed to mark decision expired");
    }
  }

  tracing::info!(count = expired.len(), %cutoff, "expired stale labels");
  Ok(expired)
}
