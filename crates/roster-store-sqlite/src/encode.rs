//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings.

use chrono::{DateTime, Utc};
use roster_core::account::{Account, RoleAssignment};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawAccount::from_row`].
pub const ACCOUNT_COLUMNS: &str =
  "a.account_id, a.email, a.full_name, a.external_subject_id, a.created_at";

/// Raw strings read directly from an `accounts` row.
pub struct RawAccount {
  pub account_id:          String,
  pub email:               String,
  pub full_name:           Option<String>,
  pub external_subject_id: Option<String>,
  pub created_at:          String,
}

impl RawAccount {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:          row.get(0)?,
      email:               row.get(1)?,
      full_name:           row.get(2)?,
      external_subject_id: row.get(3)?,
      created_at:          row.get(4)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      account_id:          decode_uuid(&self.account_id)?,
      email:               self.email,
      full_name:           self.full_name,
      external_subject_id: self.external_subject_id,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `roles` row.
pub struct RawRole {
  pub role_id:    String,
  pub account_id: String,
  pub role:       String,
}

impl RawRole {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      role_id:    row.get(0)?,
      account_id: row.get(1)?,
      role:       row.get(2)?,
    })
  }

  pub fn into_assignment(self) -> Result<RoleAssignment> {
    Ok(RoleAssignment {
      role_id:    decode_uuid(&self.role_id)?,
      account_id: decode_uuid(&self.account_id)?,
      role:       self.role,
    })
  }
}
