//! `assertiveness_increase_possible`: the author states the same claim more
//! confidently than last time while citing nothing new.

use claimdrift_claims::claim_state;
use claimdrift_core::{
  label::{Evidence, LabelCandidate},
  post::Post,
};

use crate::{DriftRule, RuleContext, candidate};

pub const SCORE: f64 = 0.7;
pub const REASON: &str = "assertiveness/confidence increased without new evidence";

pub struct AssertivenessIncrease;

impl DriftRule for AssertivenessIncrease {
  fn id(&self) -> &'static str { "assertiveness_increase" }

  fn label(&self) -> &'static str { "assertiveness_increase_possible" }

  fn evaluate(&self, post: &Post, ctx: &RuleContext<'_>) -> Vec<LabelCandidate> {
    let priors = ctx.prior_claims(post);
    let Some(prior) = priors.last().and_then(|c| c.post.as_ref()) else {
      return vec![];
    };

    let delta = claim_state(prior).compare(&claim_state(post));
    if delta.confidence_delta < ctx.config.assertiveness_delta || delta.evidence_changed {
      return vec![];
    }
    vec![candidate(self, post, SCORE, REASON, Evidence::with_prior(&prior.uri, &post.uri))]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{HistorySnapshot, RuleConfig, testing::*};

  fn run(posts: &[Post], config: &RuleConfig) -> Vec<LabelCandidate> {
    let history = HistorySnapshot::from_posts(posts, config);
    let last = &posts[posts.len() - 1];
    let ctx = RuleContext::new(std::slice::from_ref(last), &history, config);
    AssertivenessIncrease.evaluate(last, &ctx)
  }

  #[test]
  fn fires_on_confidence_jump() {
    let posts = vec![
      post("at://a/1", "did:a", 0, "100 people were evacuated."),
      post("at://a/2", "did:a", 30, "100 people were evacuated, definitely confirmed."),
    ];
    let out = run(&posts, &RuleConfig::default());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].label, "assertiveness_increase_possible");
    assert_eq!(out[0].evidence[0].prior.as_deref(), Some("at://a/1"));
  }

  #[test]
  fn threshold_is_configurable() {
    let posts = vec![
      post("at://a/1", "did:a", 0, "100 people were evacuated."),
      post("at://a/2", "did:a", 30, "100 people were evacuated, definitely confirmed."),
    ];
    let strict = RuleConfig { assertiveness_delta: 0.9, ..Default::default() };
    assert!(run(&posts, &strict).is_empty());
  }

  #[test]
  fn new_evidence_suppresses_it() {
    let mut sourced = post("at://a/2", "did:a", 30, "100 people were evacuated, definitely confirmed.");
    sourced.external_links = vec!["https://news.example/evac".into()];
    let posts = vec![post("at://a/1", "did:a", 0, "100 people were evacuated."), sourced];
    assert!(run(&posts, &RuleConfig::default()).is_empty());
  }
}
