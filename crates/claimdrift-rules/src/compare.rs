//! Loose textual comparison of two claims.

fn normalize(text: &str) -> String { text.to_lowercase().replace('\n', " ").trim().to_owned() }

/// Whether `current` plausibly restates `prior`: either contains the other,
/// or some word of `prior` longer than four characters appears in `current`.
pub fn comparable_claim_texts(prior: &str, current: &str) -> bool {
  let p = normalize(prior);
  let c = normalize(current);
  p.contains(&c)
    || c.contains(&p)
    || p
      .split_whitespace()
      .any(|tok| tok.chars().count() > 4 && c.contains(tok))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn containment_either_way() {
    assert!(comparable_claim_texts(
      "According to source X, 100 people were evacuated.",
      "100 people were evacuated."
    ));
    assert!(comparable_claim_texts("short", "a SHORT claim"));
  }

  #[test]
  fn shared_long_word() {
    assert!(comparable_claim_texts("bridge collapsed today", "the collapsed span"));
    assert!(!comparable_claim_texts("the cat sat", "a dog ran"));
  }
}
