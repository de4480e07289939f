//! `time_inconsistency`: a post mentions a date after its own creation.

use chrono::NaiveDate;
use claimdrift_claims::extract;
use claimdrift_core::{
  label::{Evidence, LabelCandidate},
  post::Post,
};

use crate::{DriftRule, RuleContext, candidate};

pub const SCORE: f64 = 0.4;
pub const REASON: &str = "mentioned date appears in future compared to createdAt";

pub struct TimeInconsistency;

impl DriftRule for TimeInconsistency {
  fn id(&self) -> &'static str { "time_inconsistency" }

  fn label(&self) -> &'static str { "time_inconsistency" }

  fn evaluate(&self, post: &Post, _ctx: &RuleContext<'_>) -> Vec<LabelCandidate> {
    let future = extract(&post.text).dates.into_iter().find(|d| {
      NaiveDate::parse_from_str(d, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .is_some_and(|midnight| midnight.and_utc() > post.created_at)
    });

    future
      .map(|date| {
        let evidence = Evidence { date_mentioned: Some(date), ..Evidence::post(&post.uri) };
        candidate(self, post, SCORE, REASON, evidence)
      })
      .into_iter()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{HistorySnapshot, RuleConfig, testing::*};

  fn run(p: &Post) -> Vec<LabelCandidate> {
    let config = RuleConfig::default();
    let history = HistorySnapshot::default();
    let ctx = RuleContext::new(std::slice::from_ref(p), &history, &config);
    TimeInconsistency.evaluate(p, &ctx)
  }

  #[test]
  fn future_dates_fire() {
    // t0 is 2026-01-30T12:00Z.
    let out = run(&post("at://a/1", "did:a", 0, "Evacuation ends on 2026-02-03."));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].evidence[0].date_mentioned.as_deref(), Some("2026-02-03"));
    assert_eq!(out[0].score, SCORE);
  }

  #[test]
  fn past_same_day_and_invalid_dates_do_not() {
    assert!(run(&post("at://a/1", "did:a", 0, "It began 2026-01-02.")).is_empty());
    assert!(run(&post("at://a/1", "did:a", 0, "It began 2026-01-30.")).is_empty());
    assert!(run(&post("at://a/1", "did:a", 0, "It began 2026-13-45.")).is_empty());
  }
}
