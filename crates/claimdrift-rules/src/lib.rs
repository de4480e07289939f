//! The drift rule engine.
//!
//! Each rule inspects one post against a pre-fetched [`RuleContext`] and
//! proposes zero or more [`LabelCandidate`]s. Rules are pure and share no
//! state; the engine runs all of them and drops candidates scoring below
//! [`MIN_SCORE`].

pub mod assertiveness;
pub mod compare;
pub mod config;
pub mod context;
pub mod provenance;
pub mod quote;
pub mod repeat;
pub mod time;

pub use config::RuleConfig;
pub use context::{HistorySnapshot, PriorClaim, RuleContext};

use claimdrift_core::{
  label::{Evidence, LabelCandidate},
  post::Post,
};

/// Candidates scoring below this are discarded.
pub const MIN_SCORE: f64 = 0.4;

/// A single drift detector.
pub trait DriftRule: Send + Sync {
  /// Stable identifier recorded with every decision.
  fn id(&self) -> &'static str;

  /// Label name this rule produces.
  fn label(&self) -> &'static str;

  fn evaluate(&self, post: &Post, ctx: &RuleContext<'_>) -> Vec<LabelCandidate>;
}

/// Every rule the engine runs, in evaluation order.
pub static RULES: &[&dyn DriftRule] = &[
  &provenance::ProvenanceLaundering,
  &repeat::RepeatClaim,
  &assertiveness::AssertivenessIncrease,
  &quote::QuoteMismatch,
  &time::TimeInconsistency,
];

/// Run every rule against `post`.
pub fn evaluate(post: &Post, ctx: &RuleContext<'_>) -> Vec<LabelCandidate> {
  RULES
    .iter()
    .flat_map(|rule| rule.evaluate(post, ctx))
    .filter(|c| c.score >= MIN_SCORE)
    .collect()
}

pub(crate) fn candidate(
  rule: &dyn DriftRule,
  post: &Post,
  score: f64,
  reason: &str,
  evidence: Evidence,
) -> LabelCandidate {
  LabelCandidate {
    subject_uri: post.uri.clone(),
    label:       rule.label().to_owned(),
    score,
    reasons:     vec![reason.to_owned()],
    evidence:    vec![evidence],
    rule_id:     rule.id().to_owned(),
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use chrono::{DateTime, Duration, TimeZone, Utc};
  use claimdrift_core::post::Post;

  pub fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap() }

  pub fn post(uri: &str, author: &str, minutes: i64, text: &str) -> Post {
    Post {
      uri:              uri.into(),
      cid:              None,
      text:             text.into(),
      created_at:       t0() + Duration::minutes(minutes),
      author_did:       author.into(),
      reply_parent_uri: None,
      reply_root_uri:   None,
      facets:           vec![],
      embeds:           vec![],
      external_links:   vec![],
    }
  }

  pub fn reply(uri: &str, root: &str, author: &str, minutes: i64, text: &str) -> Post {
    Post { reply_root_uri: Some(root.into()), ..post(uri, author, minutes, text) }
  }
}

#[cfg(test)]
mod tests {
  use super::{testing::*, *};

  #[test]
  fn rule_ids_are_unique() {
    let mut ids: Vec<_> = RULES.iter().map(|r| r.id()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), RULES.len());
  }

  #[test]
  fn engine_runs_every_rule_on_a_thread() {
    let config = RuleConfig::default();
    let history = HistorySnapshot::default();
    let thread = vec![
      post("at://a/1", "did:a", 0, "According to source X, 100 people were evacuated."),
      reply("at://a/2", "at://a/1", "did:a", 10, "100 people were evacuated."),
    ];
    let ctx = RuleContext::new(&thread, &history, &config);

    let first = evaluate(&thread[0], &ctx);
    let labels: Vec<_> = first.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["quote_mismatch"]);

    let second = evaluate(&thread[1], &ctx);
    let labels: Vec<_> = second.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["provenance_laundering_possible", "repeat_claim_no_new_evidence"]);
    assert_eq!(second[0].evidence[0].prior.as_deref(), Some("at://a/1"));
  }
}
