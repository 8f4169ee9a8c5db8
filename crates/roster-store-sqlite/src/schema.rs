//! SQL schema for the Roster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Emails are lowercased on write. The UNIQUE constraint is case-sensitive so
-- legacy mixed-case rows can still be loaded and merged.
CREATE TABLE IF NOT EXISTS accounts (
    account_id          TEXT PRIMARY KEY,
    email               TEXT NOT NULL UNIQUE,
    full_name           TEXT,
    external_subject_id TEXT UNIQUE,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roles (
    role_id    TEXT PRIMARY KEY,
    account_id TEXT NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    role       TEXT NOT NULL,
    UNIQUE (account_id, role)
);

CREATE INDEX IF NOT EXISTS accounts_email_lower_idx ON accounts(lower(email));
CREATE INDEX IF NOT EXISTS roles_account_idx        ON roles(account_id);
CREATE INDEX IF NOT EXISTS roles_role_idx           ON roles(role);

PRAGMA user_version = 1;
";
