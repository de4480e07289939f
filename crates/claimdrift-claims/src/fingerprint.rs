//! Claim fingerprints.
//!
//! A fingerprint is built from segments, highest-priority first:
//!
//! - `Q:` sorted, normalised quantities, followed by a `P:` preposition and
//!   object from the first claim span or, failing that, a `C:` content token;
//! - `E:` sorted, canonical entities left after lexicon filtering;
//! - `S:` sorted normalised spans, only when nothing above applied;
//! - `T:` the normalised text, when there is nothing else.
//!
//! The segments are joined with `|`, hashed with SHA-256 and truncated to 16
//! hex chars. [`fingerprint_debug`] exposes the same source string.

use std::{collections::BTreeSet, sync::LazyLock};

use claimdrift_core::{claim::Fingerprint, json::canonical_value_string};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
  extract::{ClaimSignal, extract},
  normalize::{NumberMode, normalize_number, normalize_text},
  short_digest,
};

/// Schema version of the segment construction below.
pub const FINGERPRINT_VERSION: &str = "v1";

static PREP_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\b(in|by)\s+([A-Za-z0-9_\-]{2,})").unwrap());

static NUMBER_TOKEN_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b\d[\d.,]*k?\b").unwrap());

static URL_HOST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://([^/]+)").unwrap());

// ─── Configuration ───────────────────────────────────────────────────────────

/// How entities are canonicalised before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCanon {
  #[default]
  None,
  /// URLs collapse to their lowercased host.
  Domain,
  /// `@handles` are lowercased.
  Handles,
}

impl EntityCanon {
  pub fn apply(self, entity: &str) -> String {
    let entity = entity.trim();
    match self {
      EntityCanon::None => entity.to_owned(),
      EntityCanon::Handles if entity.starts_with('@') => entity.to_lowercase(),
      EntityCanon::Handles => entity.to_owned(),
      EntityCanon::Domain => match URL_HOST_RE.captures(entity) {
        Some(c) => {
          let host = c[1].to_lowercase();
          host.split(':').next().unwrap_or_default().to_owned()
        }
        None => entity.to_owned(),
      },
    }
  }
}

fn lexicon(words: &[&str]) -> BTreeSet<String> {
  words.iter().map(|w| (*w).to_owned()).collect()
}

/// Every knob of the fingerprint algorithm. Passed explicitly into each call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
  /// Keep quoted passages instead of stripping them.
  pub quote_keep:        bool,
  pub number_mode:       NumberMode,
  pub entity_canon:      EntityCanon,
  /// Modal words that never count as entities or content tokens.
  pub modal_filter:      BTreeSet<String>,
  pub entity_stopwords:  BTreeSet<String>,
  /// Words skipped when picking a `C:` or `P:` token.
  pub context_stopwords: BTreeSet<String>,
  /// Hedges that must not separate two claims.
  pub hedge_filter:      BTreeSet<String>,
}

impl Default for FingerprintConfig {
  fn default() -> Self {
    Self {
      quote_keep:        false,
      number_mode:       NumberMode::Bucket,
      entity_canon:      EntityCanon::None,
      modal_filter:      lexicon(&["confirmed", "reported", "according", "report", "said", "says"]),
      entity_stopwords:  lexicon(&[
        "about", "per", "some", "see", "screenshot", "report", "reporting", "source",
        "approximately", "approx",
      ]),
      context_stopwords: lexicon(&[
        "people", "were", "in", "the", "a", "of", "per", "some", "about", "see", "report",
        "screenshot", "reported", "according", "source",
      ]),
      hedge_filter:      lexicon(&[
        "think", "maybe", "might", "could", "possibly", "suggests", "about", "approximately",
      ]),
    }
  }
}

impl FingerprintConfig {
  /// Hash of the full configuration and schema version.
  pub fn config_hash(&self) -> String {
    short_digest(&canonical_value_string(&json!({
      "fingerprint_version": FINGERPRINT_VERSION,
      "config": self,
    })))
  }

  fn is_filtered_entity(&self, lower: &str) -> bool {
    self.modal_filter.contains(lower) || self.entity_stopwords.contains(lower)
  }
}

// ─── Fingerprinting ──────────────────────────────────────────────────────────

/// Debug view of a fingerprint computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintDebug {
  pub fingerprint_version: String,
  pub fingerprint:         String,
  /// The pre-hash segment string.
  pub source:              String,
  pub config:              FingerprintConfig,
  pub config_hash:         String,
}

pub fn fingerprint(text: &str, config: &FingerprintConfig) -> Fingerprint {
  let source = fingerprint_source(&extract(text), text, config);
  Fingerprint::new(short_digest(&source), FINGERPRINT_VERSION)
}

pub fn fingerprint_debug(text: &str, config: &FingerprintConfig) -> FingerprintDebug {
  let source = fingerprint_source(&extract(text), text, config);
  FingerprintDebug {
    fingerprint_version: FINGERPRINT_VERSION.to_owned(),
    fingerprint:         short_digest(&source),
    source,
    config:              config.clone(),
    config_hash:         config.config_hash(),
  }
}

fn fingerprint_source(signals: &ClaimSignal, text: &str, config: &FingerprintConfig) -> String {
  let mut parts = Vec::new();

  if !signals.quantities.is_empty() {
    let mut raw = signals.quantities.clone();
    raw.sort();
    let normalized: Vec<String> = raw
      .iter()
      .map(|q| normalize_number(q, config.number_mode))
      .collect();
    parts.push(format!("Q:{}", normalized.join(",")));

    if let Some(segment) = signals.spans.first().and_then(|s| context_segment(s, config)) {
      parts.push(segment);
    }
  }

  let mut entities: Vec<String> = signals
    .entities
    .iter()
    .filter(|e| !e.is_empty())
    .filter(|e| !config.is_filtered_entity(e.to_lowercase().trim_matches(':')))
    .map(|e| config.entity_canon.apply(e))
    .collect();
  if !entities.is_empty() {
    entities.sort();
    parts.push(format!("E:{}", entities.join(",")));
  }

  if parts.is_empty() && !signals.spans.is_empty() {
    let mut spans: Vec<String> = signals
      .spans
      .iter()
      .map(|s| normalize_text(s, config.number_mode, config.quote_keep))
      .collect();
    spans.sort();
    parts.push(format!("S:{}", spans.join(",")));
  }

  if parts.is_empty() {
    parts.push(format!("T:{}", normalize_text(text, config.number_mode, config.quote_keep)));
  }

  parts.join("|")
}

/// `P:` from a preposition phrase, else `C:` from the first content word.
fn context_segment(span: &str, config: &FingerprintConfig) -> Option<String> {
  if let Some(c) = PREP_RE.captures(span) {
    let prep = c[1].to_lowercase();
    let object = c[2].to_lowercase();
    if !config.context_stopwords.contains(&object) && !config.entity_stopwords.contains(&object) {
      return Some(format!("P:{prep}:{object}"));
    }
  }

  let normalized = normalize_text(span, config.number_mode, config.quote_keep);
  let without_numbers = NUMBER_TOKEN_RE.replace_all(&normalized, "");
  let token = without_numbers
    .split_whitespace()
    .find(|t| t.chars().count() > 3 && !config.context_stopwords.contains(*t))?;

  let lower = token.to_lowercase();
  let hedged = config.hedge_filter.contains(&lower) || config.is_filtered_entity(&lower);
  (!hedged).then(|| format!("C:{token}"))
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn source(text: &str) -> String { fingerprint_debug(text, &FingerprintConfig::default()).source }

  fn fp(text: &str) -> Fingerprint { fingerprint(text, &FingerprintConfig::default()) }

  #[test]
  fn near_misses_are_separated() {
    assert_eq!(source("200 people were affected"), "Q:200|C:affected");
    assert_eq!(source("20 people were affected"), "Q:20|C:affected");
    assert_ne!(fp("200 people were affected"), fp("20 people were affected"));
    assert_ne!(fp("200 people were affected"), fp("200 people were evacuated"));
  }

  #[test]
  fn attribution_does_not_change_identity() {
    assert_eq!(source("According to source X, 100 people were evacuated."), "Q:100|C:evacuated");
    assert_eq!(
      fp("According to source X, 100 people were evacuated."),
      fp("100 people were evacuated.")
    );
  }

  #[test]
  fn preposition_and_entity_segments() {
    assert_eq!(
      source("300 evacuated in Springfield"),
      "Q:300|P:in:springfield|E:Springfield"
    );
    assert_eq!(source("Officials in Springfield said so"), "E:Officials,Springfield");
  }

  #[test]
  fn hedged_claims_drop_the_content_token() {
    assert_eq!(source("maybe 40 people were affected"), "Q:40");
    assert_eq!(source("possibly 40 were hurt"), "Q:40");
    assert_eq!(fp("maybe 40 people were affected"), fp("possibly 40 were hurt"));
  }

  #[test]
  fn span_and_text_fallbacks() {
    assert_eq!(source("it was reportedly true"), "S:it was reportedly true");
    assert_eq!(source("hello   there"), "T:hello there");
  }

  #[test]
  fn debug_matches_production() {
    let text = "On 2026-01-30 about 1,200 were affected in Ohio.";
    let debug = fingerprint_debug(text, &FingerprintConfig::default());
    assert_eq!(debug.fingerprint, fp(text).value);
    assert_eq!(debug.fingerprint_version, FINGERPRINT_VERSION);
    assert_eq!(debug.fingerprint.len(), 16);
  }

  #[test]
  fn number_mode_changes_fingerprint_and_config_hash() {
    let exact = FingerprintConfig { number_mode: NumberMode::Exact, ..Default::default() };
    let bucket = FingerprintConfig::default();
    assert_eq!(fingerprint("230 affected", &bucket), fingerprint("210 affected", &bucket));
    assert_ne!(fingerprint("230 affected", &exact), fingerprint("210 affected", &exact));
    assert_ne!(exact.config_hash(), bucket.config_hash());
    assert_eq!(bucket.config_hash(), FingerprintConfig::default().config_hash());
  }

  #[test]
  fn entity_canonicalisation() {
    assert_eq!(EntityCanon::Domain.apply("https://WWW.Example.com:443/a"), "www.example.com");
    assert_eq!(EntityCanon::Handles.apply("@Alice"), "@alice");
    assert_eq!(EntityCanon::None.apply(" Alice "), "Alice");
  }

  proptest! {
    #[test]
    fn fingerprint_is_total(text in ".{0,200}") {
      let a = fp(&text);
      prop_assert_eq!(a.value.len(), 16);
      prop_assert!(a.value.chars().all(|c| c.is_ascii_hexdigit()));
      prop_assert_eq!(a, fp(&text));
    }
  }
}
