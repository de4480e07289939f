//! Error types for `claimdrift-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown emit mode: {0:?}")]
  UnknownEmitMode(String),

  #[error("unknown emit status: {0:?}")]
  UnknownEmitStatus(String),

  #[error("unknown decision status: {0:?}")]
  UnknownDecisionStatus(String),

  #[error("invalid timestamp: {0:?}")]
  InvalidTimestamp(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
