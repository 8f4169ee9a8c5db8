//! Accounts, role assignments, and the materialised account view.
//!
//! An [`Account`] holds identity metadata only. Its roles live in separate
//! [`RoleAssignment`] rows; the [`AccountView`] served to callers is
//! assembled on read from both.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  highest::{HighestRoleMap, highest_role_map},
};

// ─── Stored records ──────────────────────────────────────────────────────────

/// A registered identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
  pub account_id:          Uuid,
  /// Always stored lowercased.
  #[serde(rename = "email_address")]
  pub email:               String,
  pub full_name:           Option<String>,
  pub external_subject_id: Option<String>,
  pub created_at:          DateTime<Utc>,
}

/// A single `(account, role)` grant. Role tokens are stored as plain strings
/// so that legacy values already persisted keep reading back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
  pub role_id:    Uuid,
  pub account_id: Uuid,
  pub role:       String,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A validated registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
  pub email:               String,
  pub external_subject_id: Option<String>,
}

impl NewAccount {
  pub fn new(email: &str, external_subject_id: Option<&str>) -> Result<Self> {
    Ok(Self {
      email:               normalize_email(email)?,
      external_subject_id: normalize_subject_id(external_subject_id),
    })
  }
}

/// Field changes applied to an account in a single transaction.
///
/// `None` leaves a field untouched. `roles`, when present, replaces the whole
/// role set and must already be canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
  pub email:               Option<String>,
  pub full_name:           Option<String>,
  pub external_subject_id: Option<String>,
  pub roles:               Option<BTreeSet<String>>,
}

/// Criteria for [`AccountStore::find_account`](crate::store::AccountStore::find_account).
///
/// Every criterion that is set must match the same account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountLookup {
  pub account_id:          Option<Uuid>,
  pub email:               Option<String>,
  pub external_subject_id: Option<String>,
}

impl AccountLookup {
  pub fn by_id(account_id: Uuid) -> Self {
    Self { account_id: Some(account_id), ..Self::default() }
  }

  /// The email is lowercased; it is not otherwise validated.
  pub fn by_email(email: &str) -> Self {
    Self { email: Some(email.trim().to_lowercase()), ..Self::default() }
  }

  pub fn by_subject_id(subject_id: &str) -> Self {
    Self {
      external_subject_id: Some(subject_id.to_owned()),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.account_id.is_none()
      && self.email.is_none()
      && self.external_subject_id.is_none()
  }

  /// Human-readable description of the criteria, used in not-found errors.
  pub fn describe(&self) -> String {
    let mut parts = Vec::new();
    if let Some(id) = self.account_id {
      parts.push(format!("account_id={id}"));
    }
    if let Some(email) = &self.email {
      parts.push(format!("email_address={email}"));
    }
    if let Some(subject) = &self.external_subject_id {
      parts.push(format!("external_subject_id={subject}"));
    }
    parts.join(", ")
  }
}

// ─── Materialised view ───────────────────────────────────────────────────────

/// The read model returned to callers; never stored, always derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
  pub account_id:          Uuid,
  pub email_address:       String,
  pub full_name:           Option<String>,
  pub external_subject_id: Option<String>,
  /// Sorted, de-duplicated role tokens.
  pub roles:               Vec<String>,
  pub highest_role_map:    HighestRoleMap,
}

impl AccountView {
  pub fn new(account: Account, assignments: &[RoleAssignment]) -> Self {
    let roles: Vec<String> = assignments
      .iter()
      .map(|a| a.role.clone())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();
    let highest_role_map = highest_role_map(&roles);

    Self {
      account_id: account.account_id,
      email_address: account.email,
      full_name: account.full_name,
      external_subject_id: account.external_subject_id,
      roles,
      highest_role_map,
    }
  }
}

// ─── Normalisation helpers ───────────────────────────────────────────────────

/// Trim and lowercase an email, rejecting anything without a local part and a
/// domain.
pub fn normalize_email(raw: &str) -> Result<String> {
  let email = raw.trim().to_lowercase();
  if email.is_empty() {
    return Err(Error::Validation("email_address is required".into()));
  }
  match email.split_once('@') {
    Some((local, domain))
      if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
    {
      Ok(email)
    }
    _ => Err(Error::Validation(format!(
      "email_address {raw:?} is not a valid email"
    ))),
  }
}

/// Blank subject ids are treated as absent.
pub fn normalize_subject_id(raw: Option<&str>) -> Option<String> {
  raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_is_lowercased_and_trimmed() {
    assert_eq!(
      normalize_email("  Person@Example.COM ").unwrap(),
      "person@example.com"
    );
  }

  #[test]
  fn malformed_emails_are_rejected() {
    for raw in ["", "   ", "no-at-sign", "@example.com", "person@", "a@b@c"] {
      assert!(
        matches!(normalize_email(raw), Err(Error::Validation(_))),
        "{raw:?} should be rejected"
      );
    }
  }

  #[test]
  fn blank_subject_id_is_absent() {
    assert_eq!(normalize_subject_id(Some("  ")), None);
    assert_eq!(normalize_subject_id(None), None);
    assert_eq!(normalize_subject_id(Some("abc_123")).as_deref(), Some("abc_123"));
  }

  #[test]
  fn view_sorts_roles_and_derives_highest_map() {
    let account_id = Uuid::new_v4();
    let account = Account {
      account_id,
      email: "person@example.com".into(),
      full_name: None,
      external_subject_id: None,
      created_at: Utc::now(),
    };
    let assignments: Vec<RoleAssignment> = ["NSTF_COMMENTER", "COF_ASSESSOR", "COF_ASSESSOR"]
      .into_iter()
      .map(|role| RoleAssignment {
        role_id: Uuid::new_v4(),
        account_id,
        role: role.into(),
      })
      .collect();

    let view = AccountView::new(account, &assignments);
    assert_eq!(view.roles, ["COF_ASSESSOR", "NSTF_COMMENTER"]);
    assert_eq!(view.highest_role_map.len(), 2);
    assert_eq!(view.email_address, "person@example.com");
  }
}
