//! `provenance_laundering_possible`: a claim that used to be attributed to
//! someone else is restated by the same author without the attribution.

use claimdrift_claims::{evidence::has_attribution, extract};
use claimdrift_core::{
  label::{Evidence, LabelCandidate},
  post::Post,
};

use crate::{DriftRule, RuleContext, candidate, compare::comparable_claim_texts};

pub const SCORE: f64 = 0.9;
pub const REASON: &str = "attribution removed compared to prior post";

pub struct ProvenanceLaundering;

/// `prior` was attributed, `post` is not, and they make the same claim.
fn laundered(prior: &Post, post: &Post) -> bool {
  has_attribution(&prior.text)
    && !has_attribution(&post.text)
    && (comparable_claim_texts(&prior.text, &post.text)
      || extract(&prior.text).overlaps(&extract(&post.text)))
}

impl DriftRule for ProvenanceLaundering {
  fn id(&self) -> &'static str { "provenance_laundering" }

  fn label(&self) -> &'static str { "provenance_laundering_possible" }

  fn evaluate(&self, post: &Post, ctx: &RuleContext<'_>) -> Vec<LabelCandidate> {
    if has_attribution(&post.text) {
      return vec![];
    }

    let in_thread = ctx
      .preceding_by_author(post)
      .into_iter()
      .rev()
      .find(|prior| laundered(prior, post));

    let prior = in_thread.or_else(|| {
      ctx
        .prior_claims(post)
        .into_iter()
        .rev()
        .filter_map(|c| c.post.as_ref())
        .find(|prior| laundered(prior, post))
    });

    prior
      .map(|prior| candidate(self, post, SCORE, REASON, Evidence::with_prior(&prior.uri, &post.uri)))
      .into_iter()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{HistorySnapshot, RuleConfig, testing::*};

  fn run(thread: &[Post], history: &HistorySnapshot, idx: usize) -> Vec<LabelCandidate> {
    let config = RuleConfig::default();
    let ctx = RuleContext::new(thread, history, &config);
    ProvenanceLaundering.evaluate(&thread[idx], &ctx)
  }

  #[test]
  fn fires_when_attribution_is_dropped_in_thread() {
    let thread = vec![
      post("at://a/1", "did:a", 0, "According to source X, 100 people were evacuated."),
      reply("at://a/2", "at://a/1", "did:a", 10, "100 people were evacuated."),
    ];
    let out = run(&thread, &HistorySnapshot::default(), 1);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].score, SCORE);
    assert_eq!(out[0].rule_id, "provenance_laundering");
    assert_eq!(out[0].evidence[0], Evidence::with_prior("at://a/1", "at://a/2"));
  }

  #[test]
  fn silent_when_attribution_kept_or_other_author() {
    let kept = vec![
      post("at://a/1", "did:a", 0, "Reportedly 100 people were evacuated."),
      reply("at://a/2", "at://a/1", "did:a", 10, "100 people were evacuated, reportedly."),
    ];
    assert!(run(&kept, &HistorySnapshot::default(), 1).is_empty());

    let other = vec![
      post("at://b/1", "did:b", 0, "According to source X, 100 people were evacuated."),
      reply("at://a/2", "at://b/1", "did:a", 10, "100 people were evacuated."),
    ];
    assert!(run(&other, &HistorySnapshot::default(), 1).is_empty());
  }

  #[test]
  fn falls_back_to_claim_history() {
    let earlier = post("at://a/1", "did:a", 0, "According to source X, 100 people were evacuated.");
    let later = post("at://a/9", "did:a", 60, "100 people were evacuated.");
    let history = HistorySnapshot::from_posts(&[earlier, later.clone()], &RuleConfig::default());

    let out = run(&[later], &history, 0);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].evidence[0].prior.as_deref(), Some("at://a/1"));
  }
}
