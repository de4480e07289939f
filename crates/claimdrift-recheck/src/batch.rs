//! Batch mode: run the rule engine over a file of posts, no store involved.
//!
//! Output is byte-for-byte deterministic for a given input: labels sorted by
//! `(subject_uri, label, -score)`, scores rounded to three decimals, one
//! sorted-key JSON object per line.

use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
};

use claimdrift_core::{
  emit::{EmitMode, EmitStatus},
  json::to_canonical_string,
  label::{Evidence, LabelCandidate},
  post::{Post, sort_chronologically},
};
use claimdrift_rules::{HistorySnapshot, RuleConfig, RuleContext};
use serde::Serialize;

use crate::{
  AuditLog, EmitConfig, Error, Result,
  governor::{EmitRecord, round_score},
};

// ─── Input ───────────────────────────────────────────────────────────────────

/// Parse line-delimited JSON posts. Blank lines are ignored; malformed lines
/// are logged and skipped.
pub fn parse_posts(text: &str) -> Vec<Post> {
  text
    .lines()
    .enumerate()
    .filter(|(_, line)| !line.trim().is_empty())
    .filter_map(|(i, line)| match serde_json::from_str::<Post>(line) {
      Ok(post) => Some(post),
      Err(e) => {
        tracing::warn!(line = i + 1, error = %e, "skipping malformed post");
        None
      }
    })
    .collect()
}

pub fn read_posts(path: &Path) -> Result<Vec<Post>> {
  let text = fs::read_to_string(path).map_err(Error::io(path))?;
  Ok(parse_posts(&text))
}

// ─── Detection ───────────────────────────────────────────────────────────────

/// Group posts into threads by root, each sorted chronologically.
fn threads(posts: &[Post]) -> BTreeMap<String, Vec<Post>> {
  let mut threads: BTreeMap<String, Vec<Post>> = BTreeMap::new();
  for post in posts {
    threads.entry(post.thread_root().to_owned()).or_default().push(post.clone());
  }
  for thread in threads.values_mut() {
    sort_chronologically(thread);
  }
  threads
}

fn sort_labels(labels: &mut [LabelCandidate]) {
  labels.sort_by(|a, b| {
    a.subject_uri
      .cmp(&b.subject_uri)
      .then_with(|| a.label.cmp(&b.label))
      .then_with(|| b.score.total_cmp(&a.score))
  });
}

/// Every candidate for every post, in output order. Claim history is derived
/// from the posts themselves.
pub fn detect(posts: &[Post], config: &RuleConfig) -> Vec<LabelCandidate> {
  let history = HistorySnapshot::from_posts(posts, config);
  let mut labels = Vec::new();
  for thread in threads(posts).values() {
    let ctx = RuleContext::new(thread, &history, config);
    for post in thread {
      labels.extend(claimdrift_rules::evaluate(post, &ctx));
    }
  }
  sort_labels(&mut labels);
  labels
}

/// Candidates for the post `uri`, evaluated within its thread. `None` if
/// the post is not in `posts`.
pub fn explain(posts: &[Post], uri: &str, config: &RuleConfig) -> Option<Vec<LabelCandidate>> {
  let target = posts.iter().find(|p| p.uri == uri)?;
  let history = HistorySnapshot::from_posts(posts, config);
  let threads = threads(posts);
  let thread = threads.get(target.thread_root())?;
  let ctx = RuleContext::new(thread, &history, config);
  Some(claimdrift_rules::evaluate(target, &ctx))
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OutputLine<'a> {
  subject_uri: &'a str,
  label:       &'a str,
  score:       f64,
  reasons:     &'a [String],
  evidence:    &'a [Evidence],
}

/// Deterministic JSONL rendering of `labels`.
pub fn render(labels: &[LabelCandidate]) -> Result<String> {
  let mut out = String::new();
  for l in labels {
    let line = OutputLine {
      subject_uri: &l.subject_uri,
      label:       &l.label,
      score:       round_score(l.score),
      reasons:     &l.reasons,
      evidence:    &l.evidence,
    };
    out.push_str(&to_canonical_string(&line)?);
    out.push('\n');
  }
  Ok(out)
}

// ─── Run ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveOptions {
  pub live:         bool,
  pub confirm_live: bool,
  pub max_emit:     i64,
}

impl LiveOptions {
  /// Live mode needs both the confirmation flag and a positive cap.
  pub fn check(&self) -> Result<()> {
    if !self.live {
      return Ok(());
    }
    if !self.confirm_live {
      return Err(Error::LiveWithoutConfirm);
    }
    if self.max_emit <= 0 {
      return Err(Error::LiveWithoutCap);
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
  pub labels: usize,
  pub out:    PathBuf,
  /// Where live records went and with which status.
  pub live:   Option<(EmitStatus, usize, PathBuf)>,
}

/// Detect over `input`, write the labels to `out` and, in live mode, send
/// the first `max_emit` of them through the audit sink.
pub fn run_batch(
  input: &Path,
  out: &Path,
  opts: LiveOptions,
  rules: &RuleConfig,
  emit: &EmitConfig,
) -> Result<BatchSummary> {
  let posts = read_posts(input)?;
  let labels = detect(&posts, rules);
  opts.check()?;

  if let Some(parent) = out.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent).map_err(Error::io(parent))?;
  }
  fs::write(out, render(&labels)?).map_err(Error::io(out))?;

  let live = if opts.live {
    let cap = usize::try_from(opts.max_emit).unwrap_or(usize::MAX);
    let records: Vec<EmitRecord> = labels.iter().take(cap).map(EmitRecord::from).collect();
    let mode: EmitMode = emit.effective_mode();
    let path = AuditLog::new(&emit.audit_dir).append(mode, &records)?;
    Some((mode.status(), records.len(), path))
  } else {
    None
  };

  Ok(BatchSummary { labels: labels.len(), out: out.to_path_buf(), live })
}

#[cfg(test)]
mod tests {
  use super::*;

  const INPUT: &str = r#"
{"uri":"at://a/2","text":"100 people were evacuated.","createdAt":"2026-01-30T12:10:00Z","authorDid":"did:a","replyRootUri":"at://a/1"}
{"uri":"at://a/1","text":"According to source X, 100 people were evacuated.","createdAt":"2026-01-30T12:00:00Z","authorDid":"did:a"}
not json
{"uri":"at://b/1","text":"The vote happens on 2026-02-14.","createdAt":"2026-01-30T09:00:00+01:00","authorDid":"did:b"}
"#;

  #[test]
  fn malformed_lines_are_skipped() {
    assert_eq!(parse_posts(INPUT).len(), 3);
  }

  #[test]
  fn detection_finds_laundering_and_future_dates() {
    let labels = detect(&parse_posts(INPUT), &RuleConfig::default());
    assert!(labels.iter().any(|l| {
      l.subject_uri == "at://a/2"
        && l.label == "provenance_laundering_possible"
        && l.evidence[0].prior.as_deref() == Some("at://a/1")
    }));
    assert!(labels.iter().any(|l| l.subject_uri == "at://b/1" && l.label == "time_inconsistency"));

    let keys: Vec<_> = labels.iter().map(|l| (l.subject_uri.clone(), l.label.clone())).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
  }

  #[test]
  fn output_is_deterministic() {
    let posts = parse_posts(INPUT);
    let mut reversed = posts.clone();
    reversed.reverse();

    let a = render(&detect(&posts, &RuleConfig::default())).unwrap();
    let b = render(&detect(&reversed, &RuleConfig::default())).unwrap();
    assert_eq!(a, b);
    assert!(a.lines().all(|l| l.starts_with(r#"{"evidence":"#)));
  }

  #[test]
  fn explain_targets_one_post() {
    let posts = parse_posts(INPUT);
    let labels = explain(&posts, "at://a/2", &RuleConfig::default()).unwrap();
    assert!(labels.iter().all(|l| l.subject_uri == "at://a/2"));
    assert!(explain(&posts, "at://missing", &RuleConfig::default()).is_none());
  }

  #[test]
  fn live_mode_needs_confirmation_and_cap() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("posts.jsonl");
    let out = dir.path().join("labels.jsonl");
    fs::write(&input, INPUT).unwrap();
    let emit = EmitConfig { audit_dir: dir.path().join("audit"), ..Default::default() };
    let rules = RuleConfig::default();

    let unconfirmed = LiveOptions { live: true, confirm_live: false, max_emit: 5 };
    assert!(matches!(
      run_batch(&input, &out, unconfirmed, &rules, &emit),
      Err(Error::LiveWithoutConfirm)
    ));
    let uncapped = LiveOptions { live: true, confirm_live: true, max_emit: 0 };
    assert!(matches!(run_batch(&input, &out, uncapped, &rules, &emit), Err(Error::LiveWithoutCap)));
    assert!(!out.exists());

    let ok = LiveOptions { live: true, confirm_live: true, max_emit: 1 };
    let summary = run_batch(&input, &out, ok, &rules, &emit).unwrap();
    let (status, count, path) = summary.live.unwrap();
    assert_eq!(status, EmitStatus::Suppressed);
    assert_eq!(count, 1);
    assert_eq!(path, dir.path().join("audit/detect_only_emits.jsonl"));
    assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), summary.labels);
  }
}
