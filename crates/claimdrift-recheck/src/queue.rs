//! In-process pending queue: a sorted set keyed by enqueue order.
//!
//! Suitable for a single long-running process. Requests are lost on restart;
//! use the SQLite queue when that matters.

use std::{
  collections::{BTreeMap, HashMap},
  convert::Infallible,
  sync::{Mutex, PoisonError},
};

use claimdrift_core::{
  recheck::{RecheckKey, RecheckKind},
  store::PendingQueue,
};

#[derive(Debug, Default)]
struct State {
  next:  u64,
  score: HashMap<RecheckKey, u64>,
  order: BTreeMap<u64, RecheckKey>,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
  state: Mutex<State>,
}

impl MemoryQueue {
  pub fn new() -> Self { Self::default() }

  fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut state)
  }
}

impl PendingQueue for MemoryQueue {
  type Error = Infallible;

  async fn enqueue(&self, key: RecheckKey) -> Result<(), Infallible> {
    self.with_state(|s| {
      let score = s.next;
      s.next += 1;
      if let Some(old) = s.score.insert(key.clone(), score) {
        s.order.remove(&old);
      }
      s.order.insert(score, key);
    });
    Ok(())
  }

  async fn dequeue(&self, kind: RecheckKind, limit: usize) -> Result<Vec<RecheckKey>, Infallible> {
    Ok(self.with_state(|s| {
      let picked: Vec<u64> = s
        .order
        .iter()
        .filter(|(_, key)| key.kind() == kind)
        .take(limit)
        .map(|(&score, _)| score)
        .collect();

      let mut keys = Vec::with_capacity(picked.len());
      for score in picked {
        if let Some(key) = s.order.remove(&score) {
          s.score.remove(&key);
          keys.push(key);
        }
      }
      keys
    }))
  }

  async fn pending(&self, kind: RecheckKind) -> Result<usize, Infallible> {
    Ok(self.with_state(|s| s.order.values().filter(|k| k.kind() == kind).count()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn reenqueue_moves_to_back() {
    let q = MemoryQueue::new();
    q.enqueue(RecheckKey::thread("at://r/1")).await.unwrap();
    q.enqueue(RecheckKey::thread("at://r/2")).await.unwrap();
    q.enqueue(RecheckKey::thread("at://r/1")).await.unwrap();

    assert_eq!(q.pending(RecheckKind::Thread).await.unwrap(), 2);
    let keys = q.dequeue(RecheckKind::Thread, 10).await.unwrap();
    assert_eq!(keys, vec![RecheckKey::thread("at://r/2"), RecheckKey::thread("at://r/1")]);
    assert_eq!(q.pending(RecheckKind::Thread).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn kinds_are_drained_separately() {
    let q = MemoryQueue::new();
    q.enqueue(RecheckKey::claim_group("did:a", "fp")).await.unwrap();
    q.enqueue(RecheckKey::thread("at://r/1")).await.unwrap();
    q.enqueue(RecheckKey::thread("at://r/2")).await.unwrap();

    let threads = q.dequeue(RecheckKind::Thread, 1).await.unwrap();
    assert_eq!(threads, vec![RecheckKey::thread("at://r/1")]);
    assert_eq!(q.pending(RecheckKind::ClaimGroup).await.unwrap(), 1);
    assert_eq!(q.pending(RecheckKind::Thread).await.unwrap(), 1);
  }
}
