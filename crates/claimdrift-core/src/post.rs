//! A single social-media post as seen by the engine.
//!
//! Posts are immutable for the duration of an evaluation pass. The persisted
//! copy may be superseded by a later edit, in which case the next pass sees
//! the new text under the same `uri`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::{deserialize_utc, serialize_utc};

/// A post and its reply/embed metadata.
///
/// Field names follow the camelCase wire format of the ingest stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
  pub uri:              String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cid:              Option<String>,
  #[serde(default)]
  pub text:             String,
  #[serde(deserialize_with = "deserialize_utc", serialize_with = "serialize_utc")]
  pub created_at:       DateTime<Utc>,
  pub author_did:       String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply_parent_uri: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply_root_uri:   Option<String>,
  #[serde(default)]
  pub facets:           Vec<Value>,
  #[serde(default)]
  pub embeds:           Vec<Value>,
  #[serde(default)]
  pub external_links:   Vec<String>,
}

impl Post {
  /// The top-most post of this post's reply chain.
  pub fn thread_root(&self) -> &str {
    self
      .reply_root_uri
      .as_deref()
      .or(self.reply_parent_uri.as_deref())
      .unwrap_or(&self.uri)
  }

  /// Whether the post carries links or embeds.
  pub fn has_evidence(&self) -> bool {
    !self.external_links.is_empty() || !self.embeds.is_empty()
  }

  /// Whether the post carries anything a reader could follow to a source.
  pub fn has_citation(&self) -> bool {
    !self.external_links.is_empty() || !self.facets.is_empty()
  }
}

/// Sort posts by creation time, breaking ties by `uri`.
pub fn sort_chronologically(posts: &mut [Post]) {
  posts.sort_by(|a, b| {
    a.created_at
      .cmp(&b.created_at)
      .then_with(|| a.uri.cmp(&b.uri))
  });
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[test]
  fn deserialises_wire_format() {
    let post: Post = serde_json::from_value(json!({
      "uri": "at://a/1",
      "text": "hello",
      "createdAt": "2026-01-30T10:00:00+01:00",
      "authorDid": "did:plc:alice",
      "replyRootUri": "at://a/0",
      "externalLinks": ["https://example.com/x?utm=1"]
    }))
    .unwrap();

    assert_eq!(post.created_at, Utc.with_ymd_and_hms(2026, 1, 30, 9, 0, 0).unwrap());
    assert_eq!(post.thread_root(), "at://a/0");
    assert!(post.has_evidence());
    assert!(post.has_citation());
    assert!(post.facets.is_empty());
  }

  #[test]
  fn thread_root_falls_back_to_parent_then_self() {
    let mut post: Post = serde_json::from_value(json!({
      "uri": "at://a/2",
      "createdAt": "2026-01-30T10:00:00Z",
      "authorDid": "did:plc:alice",
      "replyParentUri": "at://a/1"
    }))
    .unwrap();
    assert_eq!(post.thread_root(), "at://a/1");
    post.reply_parent_uri = None;
    assert_eq!(post.thread_root(), "at://a/2");
  }
}
