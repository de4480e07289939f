//! Claim signal extraction.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static DATE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());

static QUANTITY_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\b\d[\d.,]*k?\b").unwrap());

static ENTITY_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]{2,}(?:\s+[A-Z][a-z]{2,})*)\b").unwrap());

static MODAL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)\b(definitely|confirmed|proved|certainly|sure|guaranteed|reported|reportedly|according to)\b",
  )
  .unwrap()
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Structured signals derived from a post's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSignal {
  /// Sentences that carry a date, a quantity or a modal token, in order.
  pub spans:      Vec<String>,
  /// `YYYY-MM-DD` strings.
  pub dates:      Vec<String>,
  /// Raw quantity tokens, excluding digits that only appear inside URLs.
  pub quantities: Vec<String>,
  /// Runs of capitalised words.
  pub entities:   Vec<String>,
  /// Modal and attribution tokens as written.
  pub modal:      Vec<String>,
}

impl ClaimSignal {
  /// Whether any date, quantity or entity is shared with `other`.
  pub fn overlaps(&self, other: &ClaimSignal) -> bool {
    fn shares(a: &[String], b: &[String]) -> bool { a.iter().any(|x| b.contains(x)) }
    shares(&self.dates, &other.dates)
      || shares(&self.quantities, &other.quantities)
      || shares(&self.entities, &other.entities)
  }
}

/// Extract claim signals from `text`. Never fails.
pub fn extract(text: &str) -> ClaimSignal {
  let dates = captures(&DATE_RE, text);
  let without_urls = URL_RE.replace_all(text, " ");
  let quantities = QUANTITY_RE
    .find_iter(&without_urls)
    .map(|m| m.as_str().to_owned())
    .collect();
  let entities = captures(&ENTITY_RE, text);
  let modal = captures(&MODAL_RE, text);

  let spans = split_sentences(text)
    .into_iter()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .filter(|s| DATE_RE.is_match(s) || QUANTITY_RE.is_match(s) || MODAL_RE.is_match(s))
    .map(str::to_owned)
    .collect();

  ClaimSignal { spans, dates, quantities, entities, modal }
}

fn captures(re: &Regex, text: &str) -> Vec<String> {
  re.captures_iter(text)
    .filter_map(|c| c.get(1))
    .map(|m| m.as_str().to_owned())
    .collect()
}

/// Split after `.`, `?` or `!` when followed by whitespace.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
  let mut out = Vec::new();
  let mut start = 0;
  let mut chars = text.char_indices().peekable();

  while let Some((i, c)) = chars.next() {
    if !matches!(c, '.' | '?' | '!') {
      continue;
    }
    let end = i + c.len_utf8();
    let mut next = end;
    while let Some(&(j, w)) = chars.peek() {
      if !w.is_whitespace() {
        break;
      }
      next = j + w.len_utf8();
      chars.next();
    }
    if next > end {
      out.push(&text[start..end]);
      start = next;
    }
  }
  out.push(&text[start..]);
  out
}
