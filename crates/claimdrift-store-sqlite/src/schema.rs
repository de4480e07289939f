//! SQL schema for the claim-drift SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Latest payload of every post. Replaced on edit; the previous payload moves
-- to event_versions.
CREATE TABLE IF NOT EXISTS events (
    uri         TEXT PRIMARY KEY,
    author_did  TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC, fixed precision
    root_uri    TEXT,
    parent_uri  TEXT,
    raw_json    TEXT NOT NULL,   -- canonical JSON of the Post
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_versions (
    version_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    uri         TEXT NOT NULL,
    archived_at TEXT NOT NULL,
    raw_json    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS labels (
    label_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_uri TEXT NOT NULL,
    labeler_did TEXT NOT NULL,
    label_name  TEXT,
    payload     TEXT NOT NULL,   -- canonical JSON; exact-match identity
    ctime       TEXT NOT NULL,
    expired_at  TEXT
);

-- At most one live row per exact payload.
CREATE UNIQUE INDEX IF NOT EXISTS labels_active_payload_idx
    ON labels(subject_uri, labeler_did, payload) WHERE expired_at IS NULL;

-- Append-only.
CREATE TABLE IF NOT EXISTS claim_history (
    history_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    author_did          TEXT NOT NULL,
    fingerprint         TEXT NOT NULL,
    fingerprint_version TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    confidence          REAL,
    provenance          TEXT NOT NULL DEFAULT '',
    evidence_hash       TEXT NOT NULL DEFAULT '',
    post_uri            TEXT NOT NULL,
    post_cid            TEXT
);

-- Append-only apart from status: committed -> expired.
CREATE TABLE IF NOT EXISTS label_decisions (
    decision_id         TEXT PRIMARY KEY,
    created_at          TEXT NOT NULL,
    subject_uri         TEXT NOT NULL,
    root_uri            TEXT,
    label               TEXT NOT NULL,
    rule_id             TEXT NOT NULL,
    fingerprint_version TEXT NOT NULL,
    inputs              TEXT NOT NULL,
    evidence_hashes     TEXT NOT NULL,
    decision_trace      TEXT NOT NULL,
    config_hash         TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'committed'
        CHECK (status IN ('committed', 'expired'))
);

CREATE TABLE IF NOT EXISTS quarantine_emits (
    emit_id     TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    emit_mode   TEXT NOT NULL,
    emit_status TEXT NOT NULL,
    emit_reason TEXT,
    payload     TEXT NOT NULL
);

-- Re-enqueueing replaces the row, giving it a fresh seq at the back.
CREATE TABLE IF NOT EXISTS recheck_requests (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    root_uri     TEXT NOT NULL UNIQUE,
    scheduled_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS claim_recheck_requests (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    author_did   TEXT NOT NULL,
    fingerprint  TEXT NOT NULL,
    scheduled_at TEXT NOT NULL,
    UNIQUE (author_did, fingerprint)
);

CREATE INDEX IF NOT EXISTS events_root_idx         ON events(root_uri);
CREATE INDEX IF NOT EXISTS events_parent_idx       ON events(parent_uri);
CREATE INDEX IF NOT EXISTS labels_subject_idx      ON labels(subject_uri);
CREATE INDEX IF NOT EXISTS claim_history_group_idx ON claim_history(author_did, fingerprint);
CREATE INDEX IF NOT EXISTS decisions_subject_idx   ON label_decisions(subject_uri);
CREATE INDEX IF NOT EXISTS decisions_created_idx   ON label_decisions(created_at);
CREATE INDEX IF NOT EXISTS recheck_scheduled_idx   ON recheck_requests(scheduled_at);
CREATE INDEX IF NOT EXISTS claim_recheck_sched_idx ON claim_recheck_requests(scheduled_at);

PRAGMA user_version = 1;
";
