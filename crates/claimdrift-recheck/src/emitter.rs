//! Audit trail for flushed emissions.
//!
//! Nothing leaves the process over the network. Each flush is appended as
//! sorted-key JSON lines to a per-mode file under the audit directory.

use std::{
  fs::{self, OpenOptions},
  io::Write as _,
  path::PathBuf,
};

use claimdrift_core::{
  emit::{EmitMode, EmitStatus},
  json::to_canonical_string,
};
use serde::Serialize;

use crate::{Error, Result, governor::EmitRecord};

#[derive(Serialize)]
struct AuditLine<'a> {
  #[serde(flatten)]
  record:      &'a EmitRecord,
  emit_status: EmitStatus,
  emit_mode:   EmitMode,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
  dir: PathBuf,
}

impl AuditLog {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  /// The file records flushed under `mode` are appended to.
  pub fn path_for(&self, mode: EmitMode) -> PathBuf {
    let name = match mode {
      EmitMode::Emit => "live_emits.jsonl",
      EmitMode::Quarantine => "quarantine_emits.jsonl",
      EmitMode::DetectOnly => "detect_only_emits.jsonl",
    };
    self.dir.join(name)
  }

  /// Append `records` stamped with `mode` and its status. Returns the file
  /// written to.
  pub fn append(&self, mode: EmitMode, records: &[EmitRecord]) -> Result<PathBuf> {
    let path = self.path_for(mode);
    fs::create_dir_all(&self.dir).map_err(Error::io(&self.dir))?;

    let mut out = String::new();
    for record in records {
      let line = AuditLine { record, emit_status: mode.status(), emit_mode: mode };
      out.push_str(&to_canonical_string(&line)?);
      out.push('\n');
    }

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .map_err(Error::io(&path))?;
    file.write_all(out.as_bytes()).map_err(Error::io(&path))?;
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;

  fn record() -> EmitRecord {
    EmitRecord {
      subject_uri: "at://a/2".into(),
      label:       "quote_mismatch".into(),
      score:       0.55,
      reasons:     vec!["quote without citation".into()],
      evidence:    vec![],
      rule_id:     "quote_mismatch".into(),
      emit_reason: None,
    }
  }

  #[test]
  fn files_are_chosen_by_mode() {
    let log = AuditLog::new("out");
    assert_eq!(log.path_for(EmitMode::Emit), Path::new("out/live_emits.jsonl"));
    assert_eq!(log.path_for(EmitMode::Quarantine), Path::new("out/quarantine_emits.jsonl"));
    assert_eq!(log.path_for(EmitMode::DetectOnly), Path::new("out/detect_only_emits.jsonl"));
  }

  #[test]
  fn lines_are_sorted_and_stamped() {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::new(dir.path().join("audit"));

    let path = log.append(EmitMode::DetectOnly, &[record()]).unwrap();
    log.append(EmitMode::DetectOnly, &[record()]).unwrap();

    let text = fs::read_to_string(path).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
      lines[0],
      r#"{"emit_mode":"detect-only","emit_status":"suppressed","evidence":[],"label":"quote_mismatch","reasons":["quote without citation"],"rule_id":"quote_mismatch","score":0.55,"subject_uri":"at://a/2"}"#
    );
  }
}
