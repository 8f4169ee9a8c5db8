//! Merging accounts whose emails differ only by case.
//!
//! Rows written before emails were lowercased on write can leave several
//! accounts for one person. This is a maintenance operation, run from the
//! server binary, not part of request handling.
//!
//! Merge rule: within a group ordered oldest first, the first non-empty
//! `full_name` and the first non-empty `external_subject_id` win, and the
//! merged role set is the union of all roles in order of first appearance.

use serde::Serialize;
use uuid::Uuid;

use crate::account::{Account, RoleAssignment};

/// One account in a duplicate group, with its roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateAccount {
  pub account: Account,
  pub roles:   Vec<RoleAssignment>,
}

/// Accounts whose emails are equal ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
  /// The lowercased email shared by the group.
  pub email:    String,
  pub accounts: Vec<DuplicateAccount>,
}

/// The replacement for one duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
  pub merged:   Account,
  pub roles:    Vec<String>,
  /// Ids of the accounts being replaced, oldest first. Other services that
  /// hold these ids need re-pointing at `merged.account_id`.
  pub replaces: Vec<Uuid>,
}

/// Build the merge plan for a group. Returns `None` for groups with fewer than
/// two accounts.
pub fn plan_merge(group: &DuplicateGroup) -> Option<MergePlan> {
  if group.accounts.len() < 2 {
    return None;
  }

  let mut ordered: Vec<&DuplicateAccount> = group.accounts.iter().collect();
  ordered.sort_by(|a, b| {
    (a.account.created_at, a.account.account_id)
      .cmp(&(b.account.created_at, b.account.account_id))
  });

  let full_name =
    first_non_empty(ordered.iter().map(|d| d.account.full_name.as_ref()));
  let external_subject_id =
    first_non_empty(ordered.iter().map(|d| d.account.external_subject_id.as_ref()));

  let mut roles: Vec<String> = Vec::new();
  for assignment in ordered.iter().flat_map(|d| &d.roles) {
    if !roles.contains(&assignment.role) {
      roles.push(assignment.role.clone());
    }
  }

  Some(MergePlan {
    merged: Account {
      account_id: Uuid::new_v4(),
      email: group.email.to_lowercase(),
      full_name,
      external_subject_id,
      created_at: ordered[0].account.created_at,
    },
    roles,
    replaces: ordered.iter().map(|d| d.account.account_id).collect(),
  })
}

fn first_non_empty<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Option<String> {
  values.flatten().find(|v| !v.trim().is_empty()).cloned()
}
