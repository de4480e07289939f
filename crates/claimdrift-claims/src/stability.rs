//! Fingerprint stability reporting.
//!
//! Measures how a fingerprint configuration behaves over a corpus: how many
//! distinct texts collide, how often the same anchor (thread, group or uri)
//! yields more than one fingerprint, and how often small cosmetic mutations
//! flip a text's fingerprint.

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  sync::LazyLock,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fingerprint::{FINGERPRINT_VERSION, FingerprintConfig, fingerprint};

static PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

// ─── Mutations ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
  Whitespace,
  Punctuation,
  Casefold,
  UrlParam,
  Emoji,
  SmallEdit,
}

impl Mutation {
  pub const ALL: [Mutation; 6] = [
    Mutation::Whitespace,
    Mutation::Punctuation,
    Mutation::Casefold,
    Mutation::UrlParam,
    Mutation::Emoji,
    Mutation::SmallEdit,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Mutation::Whitespace => "whitespace",
      Mutation::Punctuation => "punctuation",
      Mutation::Casefold => "casefold",
      Mutation::UrlParam => "url_param",
      Mutation::Emoji => "emoji",
      Mutation::SmallEdit => "small_edit",
    }
  }

  pub fn apply(self, text: &str) -> String {
    match self {
      Mutation::Whitespace => text.split_whitespace().collect::<Vec<_>>().join(" "),
      Mutation::Punctuation => PUNCTUATION_RE.replace_all(text, "").into_owned(),
      Mutation::Casefold => text.to_lowercase(),
      Mutation::UrlParam if text.contains("http") && text.contains('?') => format!("{text}&utm=1"),
      Mutation::UrlParam if text.contains("http") => format!("{text}?utm=1"),
      Mutation::UrlParam => format!("{text} https://example.com/?utm=1"),
      Mutation::Emoji => format!("{text} \u{1F642}"),
      Mutation::SmallEdit => match text.char_indices().find(|(_, c)| c.is_alphabetic()) {
        Some((i, c)) => {
          let repl = if c.to_lowercase().eq(['b']) { 'c' } else { 'b' };
          format!("{}{repl}{}", &text[..i], &text[i + c.len_utf8()..])
        }
        None => format!("{text}a"),
      },
    }
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// One corpus line: the text plus an optional grouping anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityItem {
  pub text:   String,
  pub anchor: Option<String>,
}

impl StabilityItem {
  /// Read `text` (or `post`, `body`) and the first of `group`, `anchor`,
  /// `uri`, `id` from a JSON object.
  pub fn from_value(value: &Value) -> Self {
    let first = |keys: &[&str]| {
      keys
        .iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_owned)
    };
    Self {
      text:   first(&["text", "post", "body"]).unwrap_or_default(),
      anchor: first(&["group", "anchor", "uri", "id"]),
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionStats {
  pub unique_inputs:       usize,
  pub unique_fingerprints: usize,
  pub collision_count:     usize,
  pub collision_rate:      f64,
  pub max_bucket:          usize,
  pub p95_bucket:          usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnStats {
  pub anchors_seen:          usize,
  pub anchors_with_churn:    usize,
  pub churn_events_total:    usize,
  pub churn_rate_per_anchor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftStats {
  pub total:     usize,
  pub flips:     usize,
  pub flip_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
  pub generated_at:        DateTime<Utc>,
  pub fingerprint_version: String,
  pub config_hash:         String,
  pub collision:           CollisionStats,
  pub churn:               ChurnStats,
  /// Keyed by [`Mutation::name`].
  pub drift:               BTreeMap<String, DriftStats>,
}

fn ratio(n: usize, d: usize) -> f64 { if d == 0 { 0.0 } else { n as f64 / d as f64 } }

fn percentile(values: &[usize], p: f64) -> usize {
  if values.is_empty() {
    return 0;
  }
  let mut sorted = values.to_vec();
  sorted.sort_unstable();
  let k = ((p * sorted.len() as f64).ceil() as usize).saturating_sub(1);
  sorted[k.min(sorted.len() - 1)]
}

pub fn stability_report(
  items: &[StabilityItem],
  config: &FingerprintConfig,
  now: DateTime<Utc>,
) -> StabilityReport {
  let mut seen = BTreeSet::new();
  let unique_texts: Vec<&str> = items
    .iter()
    .map(|i| i.text.as_str())
    .filter(|t| seen.insert(*t))
    .collect();
  let fp = |t: &str| fingerprint(t, config).value;
  let base: Vec<String> = unique_texts.iter().map(|t| fp(t)).collect();

  let mut buckets: HashMap<&str, usize> = HashMap::new();
  for f in &base {
    *buckets.entry(f.as_str()).or_default() += 1;
  }
  let sizes: Vec<usize> = buckets.values().copied().collect();
  let unique_fingerprints = buckets.len();
  let collision_count = unique_texts.len().saturating_sub(unique_fingerprints);

  let collision = CollisionStats {
    unique_inputs: unique_texts.len(),
    unique_fingerprints,
    collision_count,
    collision_rate: ratio(collision_count, unique_texts.len()),
    max_bucket: sizes.iter().copied().max().unwrap_or(0),
    p95_bucket: percentile(&sizes, 0.95),
  };

  let mut anchors: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
  for item in items {
    if let Some(anchor) = item.anchor.as_deref() {
      anchors.entry(anchor).or_default().insert(fp(&item.text));
    }
  }
  let anchors_with_churn = anchors.values().filter(|s| s.len() > 1).count();
  let churn = ChurnStats {
    anchors_seen: anchors.len(),
    anchors_with_churn,
    churn_events_total: anchors.values().map(|s| s.len().saturating_sub(1)).sum(),
    churn_rate_per_anchor: ratio(anchors_with_churn, anchors.len()),
  };

  let drift = Mutation::ALL
    .iter()
    .map(|m| {
      let flips = unique_texts
        .iter()
        .zip(&base)
        .filter(|(t, f)| fp(&m.apply(t)) != **f)
        .count();
      let stats = DriftStats {
        total: unique_texts.len(),
        flips,
        flip_rate: ratio(flips, unique_texts.len()),
      };
      (m.name().to_owned(), stats)
    })
    .collect();

  StabilityReport {
    generated_at: now,
    fingerprint_version: FINGERPRINT_VERSION.to_owned(),
    config_hash: config.config_hash(),
    collision,
    churn,
    drift,
  }
}

// ─── Thresholds ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
  pub collision_rate:        f64,
  pub churn_rate_per_anchor: f64,
  /// Maximum flip rate per mutation name.
  pub drift_max:             BTreeMap<String, f64>,
}

impl Default for StabilityThresholds {
  fn default() -> Self {
    let drift_max = [
      (Mutation::Whitespace, 0.05),
      (Mutation::Punctuation, 0.05),
      (Mutation::Casefold, 0.05),
      (Mutation::UrlParam, 0.1),
      (Mutation::Emoji, 0.1),
      (Mutation::SmallEdit, 0.5),
    ]
    .into_iter()
    .map(|(m, v)| (m.name().to_owned(), v))
    .collect();
    Self { collision_rate: 0.0, churn_rate_per_anchor: 0.1, drift_max }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityVerdict {
  pub ok:     bool,
  pub checks: BTreeMap<String, bool>,
}

pub fn evaluate_stability(report: &StabilityReport, thresholds: &StabilityThresholds) -> StabilityVerdict {
  let mut checks = BTreeMap::new();
  checks.insert(
    "collision_rate_ok".to_owned(),
    report.collision.collision_rate <= thresholds.collision_rate,
  );
  checks.insert(
    "churn_rate_ok".to_owned(),
    report.churn.churn_rate_per_anchor <= thresholds.churn_rate_per_anchor,
  );
  for m in Mutation::ALL {
    let rate = report.drift.get(m.name()).map_or(0.0, |d| d.flip_rate);
    let max = thresholds.drift_max.get(m.name()).copied().unwrap_or(0.0);
    checks.insert(format!("drift_{}_ok", m.name()), rate <= max);
  }
  StabilityVerdict { ok: checks.values().all(|ok| *ok), checks }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  const FIXTURE: &[&str] = &[
    "200 people were affected.",
    "According to officials, 100 people were evacuated.",
    "About 40 homes flooded in riverside overnight.",
    "3 bridges collapsed near the river, reportedly.",
    "it was definitely true",
    "nothing to see here",
    "500 cars were stuck on the highway",
    "sources say 60 flights were cancelled by the airline",
  ];

  fn items(texts: &[&str]) -> Vec<StabilityItem> {
    texts
      .iter()
      .map(|t| StabilityItem { text: (*t).to_owned(), anchor: None })
      .collect()
  }

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap() }

  #[test]
  fn cosmetic_mutations_rarely_flip() {
    let report = stability_report(&items(FIXTURE), &FingerprintConfig::default(), now());
    let cosmetic = [Mutation::Whitespace, Mutation::Punctuation, Mutation::Casefold];
    let flips: usize = cosmetic.iter().map(|m| report.drift[m.name()].flips).sum();
    let total: usize = cosmetic.iter().map(|m| report.drift[m.name()].total).sum();
    assert_eq!(total, FIXTURE.len() * 3);
    assert!(flips * 4 <= total, "{flips} of {total} cosmetic mutations flipped");
  }

  #[test]
  fn collisions_count_distinct_texts_only() {
    let report = stability_report(
      &items(&["230 affected", "210 affected", "230 affected", "hello"]),
      &FingerprintConfig::default(),
      now(),
    );
    assert_eq!(report.collision.unique_inputs, 3);
    assert_eq!(report.collision.unique_fingerprints, 2);
    assert_eq!(report.collision.collision_count, 1);
    assert_eq!(report.collision.max_bucket, 2);
  }

  #[test]
  fn churn_is_per_anchor() {
    let corpus = vec![
      StabilityItem::from_value(&json!({ "group": "g1", "text": "200 people were affected" })),
      StabilityItem::from_value(&json!({ "group": "g1", "text": "2 people were affected" })),
      StabilityItem::from_value(&json!({ "uri": "at://x", "text": "nothing" })),
    ];
    let report = stability_report(&corpus, &FingerprintConfig::default(), now());
    assert_eq!(report.churn.anchors_seen, 2);
    assert_eq!(report.churn.anchors_with_churn, 1);
    assert_eq!(report.churn.churn_events_total, 1);
    assert_eq!(report.churn.churn_rate_per_anchor, 0.5);

    let verdict = evaluate_stability(&report, &StabilityThresholds::default());
    assert!(!verdict.ok);
    assert!(!verdict.checks["churn_rate_ok"]);
  }

  #[test]
  fn mutations() {
    assert_eq!(Mutation::Whitespace.apply("  a \n b "), "a b");
    assert_eq!(Mutation::Punctuation.apply("a, b."), "a b");
    assert_eq!(Mutation::UrlParam.apply("x"), "x https://example.com/?utm=1");
    assert_eq!(Mutation::UrlParam.apply("see http://a.b/c"), "see http://a.b/c?utm=1");
    assert_eq!(Mutation::SmallEdit.apply("12 bees"), "12 cees");
    assert_eq!(Mutation::SmallEdit.apply("12"), "12a");
  }
}
