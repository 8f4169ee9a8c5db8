//! [`AccountService`]: the logical operations exposed to the HTTP layer.
//!
//! The service owns the role catalog and an injected [`AccountStore`]. All
//! input validation happens here, before the store is touched.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  account::{
    Account, AccountLookup, AccountPatch, AccountView, NewAccount, normalize_email,
    normalize_subject_id,
  },
  bulk::{BulkRoleOutcome, BulkRoleRequest},
  highest::{HighestRoleMap, highest_role_map},
  merge::{MergePlan, plan_merge},
  roles::RoleCatalog,
  store::{AccountQuery, AccountStore},
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Requested changes to a single account. Blank strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
  pub roles:               Option<Vec<String>>,
  pub full_name:           Option<String>,
  pub email_address:       Option<String>,
  pub external_subject_id: Option<String>,
}

/// Filters for [`AccountService::search`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSearch {
  pub email_domain:  Option<String>,
  /// Exact role tokens; an account matches if it holds any of them.
  pub roles:         Option<Vec<String>>,
  /// Role fragments; an account matches if any role contains any of them.
  pub partial_roles: Option<Vec<String>>,
}

/// Parameters for [`AccountService::accounts_for_fund`].
#[derive(Debug, Clone)]
pub struct FundQuery {
  pub fund_short_name:    String,
  pub round_short_name:   Option<String>,
  pub include_assessors:  bool,
  pub include_commenters: bool,
}

impl FundQuery {
  pub fn new(fund_short_name: impl Into<String>) -> Self {
    Self {
      fund_short_name:    fund_short_name.into(),
      round_short_name:   None,
      include_assessors:  true,
      include_commenters: true,
    }
  }
}

/// An entry that passed bulk validation, ready to commit.
struct ValidatedEntry {
  email:      String,
  account_id: Uuid,
  roles:      BTreeSet<String>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Account operations over an injected store.
///
/// Cloning is cheap; the store and catalog are reference-counted.
pub struct AccountService<S> {
  store:   Arc<S>,
  catalog: Arc<RoleCatalog>,
}

impl<S> Clone for AccountService<S> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      catalog: Arc::clone(&self.catalog),
    }
  }
}

impl<S> AccountService<S>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  pub fn new(store: Arc<S>, catalog: RoleCatalog) -> Self {
    Self { store, catalog: Arc::new(catalog) }
  }

  pub fn store(&self) -> &S { &self.store }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Resolve the single account matching every criterion in `lookup`.
  pub async fn get_account_by(&self, lookup: AccountLookup) -> Result<AccountView> {
    if lookup.is_empty() {
      return Err(Error::Validation(
        "provide at least one of account_id, email_address or external_subject_id"
          .into(),
      ));
    }
    let described = lookup.describe();
    let account = self
      .store
      .find_account(lookup)
      .await?
      .ok_or(Error::UnknownAccount(described))?;
    self.view(account).await
  }

  /// Views for every known id in `ids`, keyed by id. Unknown ids are omitted.
  pub async fn get_accounts(&self, ids: Vec<Uuid>) -> Result<BTreeMap<Uuid, AccountView>> {
    if ids.is_empty() {
      return Err(Error::Validation("provide at least one account_id".into()));
    }
    let mut views = BTreeMap::new();
    for account in self.store.get_accounts(ids).await? {
      let view = self.view(account).await?;
      views.insert(view.account_id, view);
    }
    Ok(views)
  }

  /// The highest privilege per namespace for one account.
  pub async fn highest_role_map(&self, account_id: Uuid) -> Result<HighestRoleMap> {
    self
      .store
      .find_account(AccountLookup::by_id(account_id))
      .await?
      .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))?;

    let roles = self.store.list_roles(account_id).await?;
    let map = highest_role_map(roles.iter().map(|r| r.role.as_str()));
    tracing::debug!(%account_id, ?map, "computed highest role map");
    Ok(map)
  }

  pub async fn search(&self, search: AccountSearch) -> Result<Vec<AccountView>> {
    if search.roles.is_some() && search.partial_roles.is_some() {
      return Err(Error::Validation(
        "roles and partial_roles cannot be combined".into(),
      ));
    }
    let query = AccountQuery {
      email_domain:       search
        .email_domain
        .map(|d| d.trim().trim_start_matches('@').to_lowercase())
        .filter(|d| !d.is_empty()),
      roles:              search.roles.unwrap_or_default(),
      role_fragments_any: search.partial_roles.unwrap_or_default(),
      role_fragments_all: Vec::new(),
    };
    self.views(&query).await
  }

  /// Accounts holding an assessor or commenter role within a fund (and,
  /// optionally, a round). An empty result is reported as not-found.
  pub async fn accounts_for_fund(&self, fund: FundQuery) -> Result<Vec<AccountView>> {
    if !fund.include_assessors && !fund.include_commenters {
      return Err(Error::Validation(
        "one of include_assessors or include_commenters must be true".into(),
      ));
    }
    if fund.fund_short_name.trim().is_empty() {
      return Err(Error::Validation("fund short name is required".into()));
    }

    let mut role_fragments_any = Vec::new();
    if fund.include_assessors {
      role_fragments_any.push("ASSESSOR".to_owned());
    }
    if fund.include_commenters {
      role_fragments_any.push("COMMENTER".to_owned());
    }
    let mut role_fragments_all = vec![fund.fund_short_name.clone()];
    role_fragments_all.extend(fund.round_short_name.filter(|r| !r.is_empty()));

    let query = AccountQuery {
      email_domain: None,
      roles: Vec::new(),
      role_fragments_any,
      role_fragments_all,
    };
    let views = self.views(&query).await?;
    if views.is_empty() {
      return Err(Error::UnknownAccount(format!(
        "no accounts for fund {}",
        fund.fund_short_name
      )));
    }
    Ok(views)
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Register a new account by email.
  pub async fn create_account(
    &self,
    email: &str,
    external_subject_id: Option<&str>,
  ) -> Result<Account> {
    let input = NewAccount::new(email, external_subject_id)?;
    let account = self.store.create_account(input).await?;
    tracing::info!(account_id = %account.account_id, "account created");
    Ok(account)
  }

  /// Change an account's fields and, optionally, replace its role set.
  ///
  /// An account already bound to an external subject id only matches
  /// requests carrying that same id (or none); any other id is reported as
  /// not-found.
  pub async fn update_account(
    &self,
    account_id: Uuid,
    update: AccountUpdate,
  ) -> Result<AccountView> {
    let email = update
      .email_address
      .as_deref()
      .filter(|e| !e.trim().is_empty())
      .map(normalize_email)
      .transpose()?;
    let full_name = update.full_name.filter(|n| !n.trim().is_empty());
    let external_subject_id = normalize_subject_id(update.external_subject_id.as_deref());
    let roles = update
      .roles
      .map(|roles| self.catalog.normalize_all(roles))
      .transpose()?;

    let existing = self
      .store
      .find_account(AccountLookup::by_id(account_id))
      .await?
      .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))?;
    if let (Some(bound), Some(requested)) =
      (&existing.external_subject_id, &external_subject_id)
    {
      if bound != requested {
        return Err(Error::UnknownAccount(format!(
          "account_id={account_id}, external_subject_id={requested}"
        )));
      }
    }

    let patch = AccountPatch { email, full_name, external_subject_id, roles };
    let account = self
      .store
      .update_account(account_id, patch)
      .await?
      .ok_or_else(|| Error::UnknownAccount(account_id.to_string()))?;
    self.view(account).await
  }

  /// Replace the role sets of many accounts.
  ///
  /// Every entry is validated (account resolves, roles normalise) before any
  /// account is written, so bad input never causes a partial update. Accounts
  /// are then committed one at a time, in request order; a failure there
  /// stops the batch and reports which emails were already committed.
  pub async fn bulk_update_roles(&self, request: BulkRoleRequest) -> Result<BulkRoleOutcome> {
    if request.is_empty() {
      return Err(Error::Validation("bulk update requires at least one account".into()));
    }

    let mut seen = BTreeSet::new();
    for (email, selection) in request.iter() {
      if !seen.insert(normalize_email(email)?) {
        return Err(Error::Validation(format!("{email} appears more than once")));
      }
      if selection.tokens().is_empty() {
        return Err(Error::Validation(format!("no roles given for {email}")));
      }
    }

    // Validating
    let mut validated = Vec::with_capacity(request.len());
    for (email, selection) in request.iter() {
      let account = self
        .store
        .find_account(AccountLookup::by_email(email))
        .await?
        .ok_or_else(|| Error::UnknownAccount(email.to_owned()))?;
      let roles = self
        .catalog
        .normalize_all(selection.tokens())
        .map_err(|e| e.for_email(email))?;
      validated.push(ValidatedEntry {
        email: email.to_owned(),
        account_id: account.account_id,
        roles,
      });
    }

    // Committing
    let mut committed: Vec<String> = Vec::with_capacity(validated.len());
    for entry in validated {
      if let Err(e) = self.store.replace_roles(entry.account_id, entry.roles).await {
        let reason = Error::from(e);
        tracing::error!(
          account_id = %entry.account_id,
          email = %entry.email,
          committed = committed.len(),
          "bulk role update failed: {reason}"
        );
        return Err(Error::BulkCommit {
          account_id: entry.account_id,
          email: entry.email,
          committed,
          reason: Box::new(reason),
        });
      }
      committed.push(entry.email);
    }

    tracing::info!(accounts = committed.len(), "bulk role update committed");
    Ok(BulkRoleOutcome::all_updated(request))
  }

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Plan merges for every group of case-insensitively duplicated emails.
  pub async fn plan_duplicate_merge(&self) -> Result<Vec<MergePlan>> {
    let groups = self.store.find_duplicate_emails().await?;
    Ok(groups.iter().filter_map(plan_merge).collect())
  }

  pub async fn apply_duplicate_merge(&self, plans: Vec<MergePlan>) -> Result<()> {
    for plan in &plans {
      tracing::info!(
        email = %plan.merged.email,
        new_id = %plan.merged.account_id,
        replaced = plan.replaces.len(),
        "merging duplicate accounts"
      );
    }
    self.store.merge_duplicates(plans).await?;
    Ok(())
  }

  pub async fn check_store(&self) -> Result<()> {
    self.store.ping().await?;
    Ok(())
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn view(&self, account: Account) -> Result<AccountView> {
    let roles = self.store.list_roles(account.account_id).await?;
    Ok(AccountView::new(account, &roles))
  }

  async fn views(&self, query: &AccountQuery) -> Result<Vec<AccountView>> {
    let accounts = self.store.search(query).await?;
    let mut views = Vec::with_capacity(accounts.len());
    for account in accounts {
      views.push(self.view(account).await?);
    }
    Ok(views)
  }
}
