//! The `AccountStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `roster-store-sqlite`).
//! [`AccountService`](crate::AccountService) receives a store at construction
//! and never reaches for ambient state, so tests can substitute any backend.

use std::{collections::BTreeSet, future::Future};

use uuid::Uuid;

use crate::{
  account::{Account, AccountLookup, AccountPatch, NewAccount, RoleAssignment},
  merge::{DuplicateGroup, MergePlan},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`AccountStore::search`]. An empty query matches every
/// account.
///
/// All role conditions apply to the same role row: an account matches when at
/// least one of its roles satisfies every non-empty condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountQuery {
  /// Match emails ending in `@<domain>`.
  pub email_domain:       Option<String>,
  /// The role equals one of these (case-sensitive).
  pub roles:              Vec<String>,
  /// The role contains at least one of these fragments (case-sensitive).
  pub role_fragments_any: Vec<String>,
  /// The role contains every one of these fragments (case-sensitive).
  pub role_fragments_all: Vec<String>,
}

impl AccountQuery {
  pub fn has_role_conditions(&self) -> bool {
    !self.roles.is_empty()
      || !self.role_fragments_any.is_empty()
      || !self.role_fragments_all.is_empty()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Roster account store backend.
///
/// Each write method is atomic on its own. In particular, `replace_roles` and
/// `update_account` never leave an account with a partially written role set
/// visible to other readers.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait AccountStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Persist a new account. Fails with a conflict if the email or external
  /// subject id is already in use.
  fn create_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  /// Find the single account matching every criterion in `lookup`.
  fn find_account(
    &self,
    lookup: AccountLookup,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// Fetch the accounts with the given ids. Unknown ids are skipped.
  fn get_accounts(
    &self,
    ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + '_;

  /// Apply `patch` in one transaction. Returns `None` if the account does
  /// not exist, and a conflict if a uniqueness constraint would be violated.
  fn update_account(
    &self,
    account_id: Uuid,
    patch: AccountPatch,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  // ── Roles ─────────────────────────────────────────────────────────────

  /// Delete every role row for the account and insert `roles`, atomically.
  fn replace_roles(
    &self,
    account_id: Uuid,
    roles: BTreeSet<String>,
  ) -> impl Future<Output = Result<Vec<RoleAssignment>, Self::Error>> + Send + '_;

  /// All role assignments for the account, ordered by role.
  fn list_roles(
    &self,
    account_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RoleAssignment>, Self::Error>> + Send + '_;

  // ── Queries ───────────────────────────────────────────────────────────

  /// Accounts matching `query`, ordered by email.
  fn search<'a>(
    &'a self,
    query: &'a AccountQuery,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + 'a;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Groups of accounts whose emails are equal ignoring case.
  fn find_duplicate_emails(
    &self,
  ) -> impl Future<Output = Result<Vec<DuplicateGroup>, Self::Error>> + Send + '_;

  /// Replace each plan's accounts with its merged account, all in one
  /// transaction.
  fn merge_duplicates(
    &self,
    plans: Vec<MergePlan>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Round-trip to the backend; used by the health check.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
