//! Evaluation context: everything a rule may look at besides the post itself.
//!
//! Rules never touch storage. The caller loads the thread and the relevant
//! claim history up front and hands them over as a [`RuleContext`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use claimdrift_claims::{claim_history_entry, fingerprint};
use claimdrift_core::{
  claim::{ClaimHistoryEntry, Fingerprint},
  post::Post,
};

use crate::RuleConfig;

/// A claim history entry together with the post it points at, if that post
/// is still available.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorClaim {
  pub entry: ClaimHistoryEntry,
  pub post:  Option<Post>,
}

/// Claim history keyed by `(author_did, fingerprint)`.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
  groups: HashMap<(String, Fingerprint), Vec<PriorClaim>>,
}

impl HistorySnapshot {
  /// Replace the history of one claim group. Entries are kept in
  /// `(created_at, post_uri)` order.
  pub fn insert(&mut self, author_did: &str, fingerprint: Fingerprint, mut priors: Vec<PriorClaim>) {
    priors.sort_by(|a, b| {
      (a.entry.created_at, &a.entry.post_uri).cmp(&(b.entry.created_at, &b.entry.post_uri))
    });
    self.groups.insert((author_did.to_owned(), fingerprint), priors);
  }

  pub fn get(&self, author_did: &str, fingerprint: &Fingerprint) -> &[PriorClaim] {
    self
      .groups
      .get(&(author_did.to_owned(), fingerprint.clone()))
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// History derived from an in-memory corpus, one entry per post observed
  /// at its creation time.
  pub fn from_posts(posts: &[Post], config: &RuleConfig) -> Self {
    let mut grouped: HashMap<(String, Fingerprint), Vec<PriorClaim>> = HashMap::new();
    for post in posts {
      let entry = claim_history_entry(post, &config.fingerprint, post.created_at);
      grouped
        .entry((entry.author_did.clone(), entry.fingerprint.clone()))
        .or_default()
        .push(PriorClaim { entry, post: Some(post.clone()) });
    }
    let mut snapshot = Self::default();
    for ((author, fp), priors) in grouped {
      snapshot.insert(&author, fp, priors);
    }
    snapshot
  }
}

pub struct RuleContext<'a> {
  /// The unit's posts in chronological order.
  pub thread:  &'a [Post],
  pub history: &'a HistorySnapshot,
  pub config:  &'a RuleConfig,
}

impl<'a> RuleContext<'a> {
  pub fn new(thread: &'a [Post], history: &'a HistorySnapshot, config: &'a RuleConfig) -> Self {
    Self { thread, history, config }
  }

  pub fn fingerprint(&self, post: &Post) -> Fingerprint {
    fingerprint(&post.text, &self.config.fingerprint)
  }

  /// Same-author posts that come before `post` in the unit, oldest first.
  pub fn preceding_by_author(&self, post: &Post) -> Vec<&'a Post> {
    let thread: &'a [Post] = self.thread;
    let earlier = match thread.iter().position(|p| p.uri == post.uri) {
      Some(idx) => &thread[..idx],
      None => thread,
    };
    earlier
      .iter()
      .filter(|p| p.uri != post.uri && p.author_did == post.author_did)
      .filter(|p| p.created_at <= post.created_at)
      .collect()
  }

  /// History entries for the post's claim recorded strictly before it by a
  /// different post, oldest first.
  pub fn prior_claims(&self, post: &Post) -> Vec<&'a PriorClaim> {
    let before: DateTime<Utc> = post.created_at;
    let history: &'a HistorySnapshot = self.history;
    history
      .get(&post.author_did, &self.fingerprint(post))
      .iter()
      .filter(|c| c.entry.created_at < before && c.entry.post_uri != post.uri)
      .collect()
  }
}
