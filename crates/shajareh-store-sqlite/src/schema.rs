//! SQL schema for the Shajareh SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `user_version` pragma.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS persons (
    person_id       TEXT PRIMARY KEY,
    first_name      TEXT NOT NULL,
    last_name       TEXT NOT NULL,
    gender          TEXT NOT NULL,    -- 'male' | 'female'
    birth_year      INTEGER NOT NULL,
    birth_date      TEXT,             -- ISO 8601 calendar date or NULL
    birth_place     TEXT,
    death_year      INTEGER,
    death_date      TEXT,
    father_id       TEXT REFERENCES persons(person_id),
    mother_id       TEXT REFERENCES persons(person_id),
    matching_status TEXT NOT NULL DEFAULT 'no_match',
    user_id         TEXT,             -- linked account, if any
    created_by      TEXT NOT NULL,
    created_at      TEXT NOT NULL,    -- ISO 8601 UTC; server-assigned
    updated_at      TEXT NOT NULL
);

-- Symmetric spouse edges, stored once per pair in canonical order.
CREATE TABLE IF NOT EXISTS spouses (
    person_a TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    person_b TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    PRIMARY KEY (person_a, person_b),
    CHECK (person_a < person_b)
);

-- One row per pending or resolved duplicate resolution. The UNIQUE on
-- related_person_id keeps a person the subject of at most one request.
CREATE TABLE IF NOT EXISTS matching_requests (
    request_id        TEXT PRIMARY KEY,
    person_id         TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    related_person_id TEXT NOT NULL UNIQUE REFERENCES persons(person_id) ON DELETE CASCADE,
    similar_person_id TEXT REFERENCES persons(person_id) ON DELETE SET NULL,
    relation          TEXT NOT NULL,   -- 'father' | 'mother' | 'spouse' | 'child'
    status            TEXT NOT NULL DEFAULT 'awaiting_similar',
    created_by        TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tree_permission_requests (
    request_id   TEXT PRIMARY KEY,
    person_id    TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    applicant_id TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'awaiting_approve',
    created_at   TEXT NOT NULL
);

-- At most one awaiting request per (person, applicant) pair.
CREATE UNIQUE INDEX IF NOT EXISTS tree_permission_pending_idx
    ON tree_permission_requests(person_id, applicant_id)
    WHERE status = 'awaiting_approve';

-- Accounts granted visibility into a person's subtree.
CREATE TABLE IF NOT EXISTS tree_viewers (
    person_id TEXT NOT NULL REFERENCES persons(person_id) ON DELETE CASCADE,
    user_id   TEXT NOT NULL,
    PRIMARY KEY (person_id, user_id)
);

CREATE INDEX IF NOT EXISTS persons_father_idx ON persons(father_id);
CREATE INDEX IF NOT EXISTS persons_mother_idx ON persons(mother_id);
CREATE INDEX IF NOT EXISTS persons_name_idx   ON persons(last_name, first_name);
CREATE INDEX IF NOT EXISTS persons_birth_idx  ON persons(birth_year);
CREATE INDEX IF NOT EXISTS requests_status_idx ON matching_requests(status);

PRAGMA user_version = 1;
";
