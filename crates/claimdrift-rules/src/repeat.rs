//! `repeat_claim_no_new_evidence`: the same author restates a claim without
//! adding or removing supporting links or embeds.

use claimdrift_core::{
  label::{Evidence, LabelCandidate},
  post::Post,
};

use crate::{DriftRule, RuleContext, candidate, compare::comparable_claim_texts};

pub const SCORE: f64 = 0.6;
pub const REASON: &str = "claim repeated without new evidence";

pub struct RepeatClaim;

impl DriftRule for RepeatClaim {
  fn id(&self) -> &'static str { "repeat_claim_no_new_evidence" }

  fn label(&self) -> &'static str { "repeat_claim_no_new_evidence" }

  fn evaluate(&self, post: &Post, ctx: &RuleContext<'_>) -> Vec<LabelCandidate> {
    ctx
      .preceding_by_author(post)
      .into_iter()
      .rev()
      .find(|prior| {
        comparable_claim_texts(&prior.text, &post.text) && prior.has_evidence() == post.has_evidence()
      })
      .map(|prior| candidate(self, post, SCORE, REASON, Evidence::with_prior(&prior.uri, &post.uri)))
      .into_iter()
      .collect()
  }
}
