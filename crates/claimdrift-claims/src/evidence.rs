//! Evidence hashing, claim state and ledger inputs.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use claimdrift_core::{
  claim::ClaimHistoryEntry, json::canonical_value_string, ledger::DecisionInputs, post::Post,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  extract::extract,
  fingerprint::{FingerprintConfig, fingerprint},
  short_digest,
};

/// Phrases that attribute a claim to someone else.
pub const ATTRIBUTION_TOKENS: &[&str] =
  &["reportedly", "according to", "source says", "reported by", "sources say"];

static PREP_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)\b(in|by|from|at|near|inside|over|on|under|around|within)\s+([A-Za-z0-9_\-]{2,})")
    .unwrap()
});

/// The first attribution phrase found in `text`, case-insensitively.
pub fn attribution_token(text: &str) -> Option<&'static str> {
  let lower = text.to_lowercase();
  ATTRIBUTION_TOKENS.iter().copied().find(|t| lower.contains(t))
}

pub fn has_attribution(text: &str) -> bool { attribution_token(text).is_some() }

/// `scheme://host/path` with query and fragment dropped.
pub fn normalize_link(url: &str) -> String {
  let cut = |s: &str| s.find(['?', '#']).unwrap_or(s.len());
  match url.split_once("://") {
    Some((scheme, rest)) => format!("{scheme}://{}", &rest[..cut(rest)]),
    None => url[..cut(url)].to_owned(),
  }
}

/// Digest over a post's links, embeds and facets. Independent of their order
/// and of tracking parameters on links.
pub fn evidence_hash(post: &Post) -> String {
  let mut links: Vec<String> = post.external_links.iter().map(|u| normalize_link(u)).collect();
  let mut embeds: Vec<String> = post.embeds.iter().map(canonical_value_string).collect();
  let mut facets: Vec<String> = post.facets.iter().map(canonical_value_string).collect();
  links.sort();
  embeds.sort();
  facets.sort();

  short_digest(&canonical_value_string(&json!({
    "links":  links,
    "embeds": embeds,
    "facets": facets,
  })))
}

/// Assertiveness proxy: modal-token count over three, capped at one.
pub fn assertiveness(text: &str) -> f64 { (extract(text).modal.len() as f64 / 3.0).min(1.0) }

// ─── Claim state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimState {
  pub confidence:          f64,
  pub evidence_hash:       String,
  pub attribution_present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDelta {
  pub confidence_delta:    f64,
  pub evidence_changed:    bool,
  pub attribution_removed: bool,
}

pub fn claim_state(post: &Post) -> ClaimState {
  ClaimState {
    confidence:          assertiveness(&post.text),
    evidence_hash:       evidence_hash(post),
    attribution_present: has_attribution(&post.text),
  }
}

impl ClaimState {
  /// How the claim changed going from `self` to `later`.
  pub fn compare(&self, later: &ClaimState) -> ClaimDelta {
    ClaimDelta {
      confidence_delta:    later.confidence - self.confidence,
      evidence_changed:    self.evidence_hash != later.evidence_hash,
      attribution_removed: self.attribution_present && !later.attribution_present,
    }
  }
}

/// The history row recording that `post` carried its claim at `observed_at`.
pub fn claim_history_entry(
  post: &Post,
  config: &FingerprintConfig,
  observed_at: DateTime<Utc>,
) -> ClaimHistoryEntry {
  ClaimHistoryEntry {
    author_did:    post.author_did.clone(),
    fingerprint:   fingerprint(&post.text, config),
    created_at:    observed_at,
    confidence:    Some(assertiveness(&post.text)),
    provenance:    attribution_token(&post.text).unwrap_or_default().to_owned(),
    evidence_hash: evidence_hash(post),
    post_uri:      post.uri.clone(),
    post_cid:      post.cid.clone(),
  }
}

// ─── Ledger inputs ───────────────────────────────────────────────────────────

/// The signals recorded alongside a ledger decision.
pub fn decision_inputs(text: &str) -> DecisionInputs {
  let signals = extract(text);
  let prep_tokens = PREP_TOKEN_RE
    .captures_iter(text)
    .map(|c| format!("{}:{}", &c[1], &c[2]).to_lowercase())
    .collect();

  DecisionInputs {
    spans: signals.spans,
    dates: signals.dates,
    quantities: signals.quantities,
    entities: signals.entities,
    modal: signals.modal,
    prep_tokens,
  }
}
