//! `quote_mismatch`: quoting or attributing without anything to follow.

use claimdrift_core::{
  label::{Evidence, LabelCandidate},
  post::Post,
};

use crate::{DriftRule, RuleContext, candidate};

pub const SCORE: f64 = 0.55;
pub const REASON: &str = "quote or attribution present but no link/facet found";

const QUOTE_MARKS: [char; 3] = ['"', '\u{201C}', '\u{201D}'];

pub struct QuoteMismatch;

impl DriftRule for QuoteMismatch {
  fn id(&self) -> &'static str { "quote_mismatch" }

  fn label(&self) -> &'static str { "quote_mismatch" }

  fn evaluate(&self, post: &Post, _ctx: &RuleContext<'_>) -> Vec<LabelCandidate> {
    let quoting =
      post.text.contains(QUOTE_MARKS) || post.text.to_lowercase().contains("according to");
    if !quoting || post.has_citation() {
      return vec![];
    }
    vec![candidate(self, post, SCORE, REASON, Evidence::post(&post.uri))]
  }
}
