//! [`SqliteQueue`], the durable pending-recheck queue.
//!
//! Thread requests live in `recheck_requests`, claim-group requests in
//! `claim_recheck_requests`. Enqueueing an existing key replaces its row,
//! which moves it to the back of the queue.

use chrono::Utc;
use rusqlite::params;

use claimdrift_core::{
  recheck::{RecheckKey, RecheckKind},
  store::PendingQueue,
};

use crate::{encode::encode_dt, Error, Result, SqliteStore};

#[derive(Clone)]
pub struct SqliteQueue {
  conn: tokio_rusqlite::Connection,
}

impl SqliteQueue {
  pub fn new(store: &SqliteStore) -> Self { Self { conn: store.conn.clone() } }
}

fn table(kind: RecheckKind) -> &'static str {
  match kind {
    RecheckKind::Thread => "recheck_requests",
    RecheckKind::ClaimGroup => "claim_recheck_requests",
  }
}

impl PendingQueue for SqliteQueue {
  type Error = Error;

  async fn enqueue(&self, key: RecheckKey) -> Result<()> {
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        match key {
          RecheckKey::Thread { root_uri } => conn.execute(
            "INSERT OR REPLACE INTO recheck_requests (root_uri, scheduled_at) VALUES (?1, ?2)",
            params![root_uri, now],
          )?,
          RecheckKey::ClaimGroup { author_did, fingerprint } => conn.execute(
            "INSERT OR REPLACE INTO claim_recheck_requests (author_did, fingerprint, scheduled_at)
             VALUES (?1, ?2, ?3)",
            params![author_did, fingerprint, now],
          )?,
        };
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn dequeue(&self, kind: RecheckKind, limit: usize) -> Result<Vec<RecheckKey>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let table = table(kind);

    let keys = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let rows: Vec<(i64, RecheckKey)> = {
          let mut stmt = tx.prepare(&match kind {
            RecheckKind::Thread => format!(
              "SELECT seq, root_uri, NULL FROM {table} ORDER BY scheduled_at, seq LIMIT ?1"
            ),
            RecheckKind::ClaimGroup => format!(
              "SELECT seq, author_did, fingerprint FROM {table}
                ORDER BY scheduled_at, seq LIMIT ?1"
            ),
          })?;
          let rows = stmt
            .query_map(params![limit], |r| {
              let seq: i64 = r.get(0)?;
              let first: String = r.get(1)?;
              let key = match r.get::<_, Option<String>>(2)? {
                Some(fingerprint) => RecheckKey::claim_group(first, fingerprint),
                None => RecheckKey::thread(first),
              };
              Ok((seq, key))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        for (seq, _) in &rows {
          tx.execute(&format!("DELETE FROM {table} WHERE seq = ?1"), params![seq])?;
        }
        tx.commit()?;
        Ok(rows.into_iter().map(|(_, key)| key).collect::<Vec<_>>())
      })
      .await?;

    Ok(keys)
  }

  async fn pending(&self, kind: RecheckKind) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", table(kind));
    let n: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
      .await?;
    Ok(usize::try_from(n).unwrap_or(0))
  }
}
