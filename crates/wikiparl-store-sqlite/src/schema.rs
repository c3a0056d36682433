//! SQL schema for the wikiparl state store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Grows monotonically. No DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS identity_links (
    record_id   TEXT PRIMARY KEY,   -- source record URL
    item_id     TEXT NOT NULL,      -- destination item id, e.g. 'Q42'
    linked_at   TEXT NOT NULL       -- ISO 8601 UTC
);

CREATE TABLE IF NOT EXISTS field_mappings (
    field_name  TEXT PRIMARY KEY,
    property_id TEXT NOT NULL,
    value_kind  TEXT NOT NULL       -- 'text' | 'url' | 'cross_reference' | 'timestamp'
);

CREATE TABLE IF NOT EXISTS list_freshness (
    collection_url TEXT PRIMARY KEY,
    imported_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deferred_claims (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    owning_record_id TEXT NOT NULL,
    field_name       TEXT NOT NULL,
    raw_value        TEXT NOT NULL,
    UNIQUE (owning_record_id, field_name, raw_value)
);

PRAGMA user_version = 1;
";
