//! SQL schema for the Clowder SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Raw records are strictly append-only.
-- Duplicate payloads are rejected by the UNIQUE content hash.
CREATE TABLE IF NOT EXISTS raw_records (
    record_id        TEXT PRIMARY KEY,
    source_system    TEXT NOT NULL,
    source_record_id TEXT NOT NULL,
    payload          TEXT NOT NULL,    -- JSON object of source fields
    content_hash     TEXT NOT NULL UNIQUE,
    received_at      TEXT NOT NULL     -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS entities (
    entity_id    TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,  -- 'person' | 'cat' | 'place' | 'pseudo_profile'
    display_name TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    merged_into  TEXT REFERENCES entities(entity_id)  -- tombstone pointer
);

CREATE TABLE IF NOT EXISTS identifiers (
    entity_id     TEXT NOT NULL REFERENCES entities(entity_id),
    id_type       TEXT NOT NULL,  -- 'email' | 'phone'
    value_raw     TEXT NOT NULL,
    value_norm    TEXT NOT NULL,
    confidence    REAL NOT NULL,
    source_system TEXT NOT NULL,
    PRIMARY KEY (entity_id, id_type, value_norm)
);

-- One decision per raw record, enforced by the UNIQUE constraint.
-- Immutable except the review columns, set exactly once.
CREATE TABLE IF NOT EXISTS match_decisions (
    decision_id          TEXT PRIMARY KEY,
    record_id            TEXT NOT NULL UNIQUE REFERENCES raw_records(record_id),
    source_system        TEXT NOT NULL,
    extracted_name       TEXT,
    extracted_email      TEXT,
    extracted_phone      TEXT,
    candidates_evaluated INTEGER NOT NULL DEFAULT 0,
    top_entity_id        TEXT REFERENCES entities(entity_id),
    top_score            REAL,
    decision_type        TEXT NOT NULL,
    breakdown            TEXT NOT NULL DEFAULT '[]',
    entity_id            TEXT REFERENCES entities(entity_id),
    created_at           TEXT NOT NULL,
    reviewed_at          TEXT,
    reviewed_by          TEXT,
    review_action        TEXT,
    review_notes         TEXT
);

-- (candidate signal, entity) pairs a reviewer chose to keep separate.
CREATE TABLE IF NOT EXISTS pair_suppressions (
    signal_key  TEXT NOT NULL,
    entity_id   TEXT NOT NULL REFERENCES entities(entity_id),
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (signal_key, entity_id)
);

CREATE TABLE IF NOT EXISTS household_members (
    person_id  TEXT NOT NULL REFERENCES entities(entity_id),
    place_id   TEXT NOT NULL REFERENCES entities(entity_id),
    role       TEXT NOT NULL,
    confidence REAL NOT NULL,
    source     TEXT NOT NULL,   -- 'inferred' | 'manual'
    PRIMARY KEY (person_id, place_id)
);

-- The audit log is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id    TEXT PRIMARY KEY,
    entity_kind TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    edit_type   TEXT NOT NULL,
    old_value   TEXT,
    new_value   TEXT,
    actor       TEXT NOT NULL,
    source      TEXT,
    recorded_at TEXT NOT NULL
);

-- Matching configuration; read-only to the engine, written only by the
-- administrative surface after validation.
CREATE TABLE IF NOT EXISTS match_thresholds (
    scope           TEXT PRIMARY KEY,   -- source system tag, or 'default'
    upper_threshold REAL NOT NULL,
    lower_threshold REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS fs_parameters (
    field         TEXT PRIMARY KEY,
    m_probability REAL NOT NULL,
    u_probability REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS engine_settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS identifiers_value_idx ON identifiers(id_type, value_norm);
CREATE INDEX IF NOT EXISTS entities_merged_idx   ON entities(merged_into);
CREATE INDEX IF NOT EXISTS entities_name_idx     ON entities(kind, display_name);
CREATE INDEX IF NOT EXISTS decisions_review_idx  ON match_decisions(reviewed_at);
CREATE INDEX IF NOT EXISTS audit_entity_idx      ON audit_log(entity_id);

PRAGMA user_version = 1;
";
