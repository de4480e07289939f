//! Text and number normalisation for fingerprinting.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

static DOUBLE_QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"".*?""#).unwrap());
static SINGLE_QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'.*?'").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

/// How quantities are rendered into a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberMode {
  /// The parsed integer value.
  Exact,
  /// Coarse magnitude buckets (tens, hundreds, thousands).
  #[default]
  Bucket,
  /// Every number becomes `<NUM>`.
  Redact,
}

/// NFKC, then collapse whitespace runs to single spaces and trim.
pub fn normalize_whitespace_and_unicode(text: &str) -> String {
  let composed: String = text.nfkc().collect();
  composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop double- and single-quoted passages.
pub fn remove_quotes(text: &str) -> String {
  let text = DOUBLE_QUOTED_RE.replace_all(text, "");
  SINGLE_QUOTED_RE.replace_all(&text, "").into_owned()
}

/// Parse a quantity token into an integer magnitude.
///
/// Understands a trailing `k`, US (`1,234.5`) and European (`1.234,5`)
/// separators and bare thousands separators. Halves round to even.
pub fn parse_quantity(token: &str) -> Option<i64> {
  let s = token.trim().to_lowercase();

  if let Some(base) = s.strip_suffix('k') {
    let v: f64 = base.replace(',', "").parse().ok()?;
    return to_int(v * 1000.0);
  }

  match (s.find('.'), s.find(',')) {
    (Some(dot), Some(comma)) => {
      let cleaned = if dot < comma {
        s.replace('.', "").replace(',', ".")
      } else {
        s.replace(',', "")
      };
      to_int(cleaned.parse().ok()?)
    }
    (None, Some(_)) => s.replace(',', "").parse().ok(),
    (Some(_), None) => to_int(s.parse().ok()?),
    (None, None) => s.parse().ok(),
  }
}

fn to_int(v: f64) -> Option<i64> {
  let rounded = v.round_ties_even();
  (rounded.is_finite() && rounded.abs() < i64::MAX as f64).then_some(rounded as i64)
}

/// Round a non-negative `n` to the nearest multiple of `unit`, halves to even.
fn round_to_unit(n: i64, unit: i64) -> i64 {
  let (q, r) = (n / unit, n % unit);
  let q = match (2 * r).cmp(&unit) {
    std::cmp::Ordering::Less => q,
    std::cmp::Ordering::Greater => q + 1,
    std::cmp::Ordering::Equal => q + q % 2,
  };
  q * unit
}

/// Render a quantity token under `mode`. Unparseable tokens pass through.
pub fn normalize_number(token: &str, mode: NumberMode) -> String {
  let Some(n) = parse_quantity(token) else {
    return token.to_owned();
  };
  match mode {
    NumberMode::Exact => n.to_string(),
    NumberMode::Redact => "<NUM>".to_owned(),
    NumberMode::Bucket => match n {
      n if n < 10 => n.to_string(),
      n if n < 100 => round_to_unit(n, 10).to_string(),
      n if n < 1000 => round_to_unit(n, 100).to_string(),
      n => format!("{}k", (n as f64 / 1000.0).round_ties_even() as i64),
    },
  }
}

/// The full text normalisation: unicode, whitespace, optional quote removal,
/// word tokens, numbers normalised, everything else lowercased.
pub fn normalize_text(text: &str, mode: NumberMode, keep_quotes: bool) -> String {
  let mut s = normalize_whitespace_and_unicode(text);
  if !keep_quotes {
    s = remove_quotes(&s);
  }
  WORD_RE
    .find_iter(&s)
    .map(|m| {
      let tok = m.as_str();
      if tok.chars().all(|c| c.is_ascii_digit()) {
        normalize_number(tok, mode)
      } else {
        tok.to_lowercase()
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}
