//! [`SqliteStore`], the SQLite implementation of [`AccountStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use roster_core::{
  account::{Account, AccountLookup, AccountPatch, NewAccount, RoleAssignment},
  merge::{DuplicateAccount, DuplicateGroup, MergePlan},
  store::{AccountQuery, AccountStore},
};

use crate::{
  Error, Result,
  encode::{ACCOUNT_COLUMNS, RawAccount, RawRole, encode_dt, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roster account store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used in tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert an account row verbatim, bypassing email normalisation. Stands in
  /// for rows written before emails were lowercased.
  #[cfg(test)]
  pub(crate) async fn insert_raw_account(
    &self,
    email: &str,
    created_at: chrono::DateTime<Utc>,
    roles: &[&str],
  ) -> Result<Uuid> {
    let account_id = Uuid::new_v4();
    let id_str = encode_uuid(account_id);
    let email = email.to_owned();
    let at_str = encode_dt(created_at);
    let roles: Vec<String> = roles.iter().map(|r| (*r).to_owned()).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO accounts (account_id, email, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, email, at_str],
        )?;
        insert_roles(&tx, &id_str, roles)?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from_write)?;
    Ok(account_id)
  }
}

// ─── Connection helpers ──────────────────────────────────────────────────────

fn select_account(conn: &Connection, account_id: &str) -> rusqlite::Result<Option<RawAccount>> {
  conn
    .query_row(
      &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.account_id = ?1"),
      rusqlite::params![account_id],
      RawAccount::from_row,
    )
    .optional()
}

fn select_roles(conn: &Connection, account_id: &str) -> rusqlite::Result<Vec<RawRole>> {
  let mut stmt = conn.prepare(
    "SELECT role_id, account_id, role FROM roles WHERE account_id = ?1 ORDER BY role",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![account_id], RawRole::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn insert_roles(
  conn: &Connection,
  account_id: &str,
  roles: impl IntoIterator<Item = String>,
) -> rusqlite::Result<Vec<RawRole>> {
  let mut stmt =
    conn.prepare("INSERT INTO roles (role_id, account_id, role) VALUES (?1, ?2, ?3)")?;
  let mut inserted = Vec::new();
  for role in roles {
    let role_id = encode_uuid(Uuid::new_v4());
    stmt.execute(rusqlite::params![role_id, account_id, role])?;
    inserted.push(RawRole { role_id, account_id: account_id.to_owned(), role });
  }
  Ok(inserted)
}

/// Whether an account other than `except` already holds `email`, compared
/// case-insensitively so unmerged mixed-case rows still count.
fn email_taken(conn: &Connection, email: &str, except: Option<&str>) -> rusqlite::Result<bool> {
  conn
    .query_row(
      "SELECT 1 FROM accounts WHERE lower(email) = lower(?1) AND account_id IS NOT ?2",
      rusqlite::params![email, except],
      |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn placeholders(start: usize, count: usize) -> String {
  (start..start + count)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ")
}

/// Build the `WHERE` clause and positional parameters for a search.
fn search_clause(query: &AccountQuery) -> (String, Vec<String>) {
  let mut conds: Vec<String> = vec![];
  let mut params: Vec<String> = vec![];

  if let Some(domain) = &query.email_domain {
    params.push(format!("@{domain}"));
    let n = params.len();
    conds.push(format!(
      "substr(a.email, length(a.email) - length(?{n}) + 1) = ?{n}"
    ));
  }

  if query.has_role_conditions() {
    let mut role_conds: Vec<String> = vec![];
    if !query.roles.is_empty() {
      let start = params.len() + 1;
      params.extend(query.roles.iter().cloned());
      role_conds.push(format!("r.role IN ({})", placeholders(start, query.roles.len())));
    }
    if !query.role_fragments_any.is_empty() {
      let mut any = vec![];
      for fragment in &query.role_fragments_any {
        params.push(fragment.clone());
        any.push(format!("instr(r.role, ?{}) > 0", params.len()));
      }
      role_conds.push(format!("({})", any.join(" OR ")));
    }
    for fragment in &query.role_fragments_all {
      params.push(fragment.clone());
      role_conds.push(format!("instr(r.role, ?{}) > 0", params.len()));
    }
    conds.push(format!(
      "EXISTS (SELECT 1 FROM roles r WHERE r.account_id = a.account_id AND {})",
      role_conds.join(" AND ")
    ));
  }

  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  (where_clause, params)
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn create_account(&self, input: NewAccount) -> Result<Account> {
    let account = Account {
      account_id:          Uuid::new_v4(),
      email:               input.email,
      full_name:           None,
      external_subject_id: input.external_subject_id,
      created_at:          Utc::now(),
    };

    let id_str      = encode_uuid(account.account_id);
    let email       = account.email.clone();
    let subject_id  = account.external_subject_id.clone();
    let at_str      = encode_dt(account.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if email_taken(&tx, &email, None)? {
          return Ok(Err(email));
        }
        tx.execute(
          "INSERT INTO accounts (account_id, email, external_subject_id, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, email, subject_id, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await
      .map_err(Error::from_write)?
      .map_err(Error::email_taken)?;

    Ok(account)
  }

  async fn find_account(&self, lookup: AccountLookup) -> Result<Option<Account>> {
    let mut conds: Vec<String> = vec![];
    let mut params: Vec<String> = vec![];
    if let Some(id) = lookup.account_id {
      params.push(encode_uuid(id));
      conds.push(format!("a.account_id = ?{}", params.len()));
    }
    if let Some(email) = lookup.email {
      params.push(email);
      conds.push(format!("lower(a.email) = lower(?{})", params.len()));
    }
    if let Some(subject_id) = lookup.external_subject_id {
      params.push(subject_id);
      conds.push(format!("a.external_subject_id = ?{}", params.len()));
    }
    if conds.is_empty() {
      return Ok(None);
    }

    // Unmerged case-variant rows can share an email; the oldest one answers.
    let sql = format!(
      "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE {}
       ORDER BY a.created_at, a.account_id LIMIT 1",
      conds.join(" AND ")
    );
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params_from_iter(params.iter()), RawAccount::from_row)
          .optional()?)
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn get_accounts(&self, ids: Vec<Uuid>) -> Result<Vec<Account>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let params: Vec<String> = ids.into_iter().map(encode_uuid).collect();
    let sql = format!(
      "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.account_id IN ({}) ORDER BY a.email",
      placeholders(1, params.len())
    );

    let raws: Vec<RawAccount> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAccount::into_account).collect()
  }

  async fn update_account(&self, account_id: Uuid, patch: AccountPatch) -> Result<Option<Account>> {
    let id_str = encode_uuid(account_id);

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Some(email) = &patch.email {
          if email_taken(&tx, email, Some(id_str.as_str()))? {
            return Ok(Err(email.clone()));
          }
        }
        let changed = tx.execute(
          "UPDATE accounts SET
             email               = COALESCE(?2, email),
             full_name           = COALESCE(?3, full_name),
             external_subject_id = COALESCE(?4, external_subject_id)
           WHERE account_id = ?1",
          rusqlite::params![id_str, patch.email, patch.full_name, patch.external_subject_id],
        )?;
        if changed == 0 {
          return Ok(Ok(None));
        }
        if let Some(roles) = patch.roles {
          tx.execute("DELETE FROM roles WHERE account_id = ?1", rusqlite::params![id_str])?;
          insert_roles(&tx, &id_str, roles)?;
        }
        let raw = select_account(&tx, &id_str)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await
      .map_err(Error::from_write)?
      .map_err(Error::email_taken)?;

    raw.map(RawAccount::into_account).transpose()
  }

  // ── Roles ─────────────────────────────────────────────────────────────────

  async fn replace_roles(
    &self,
    account_id: Uuid,
    roles: BTreeSet<String>,
  ) -> Result<Vec<RoleAssignment>> {
    let id_str = encode_uuid(account_id);

    let inserted: Option<Vec<RawRole>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if select_account(&tx, &id_str)?.is_none() {
          return Ok(None);
        }
        tx.execute("DELETE FROM roles WHERE account_id = ?1", rusqlite::params![id_str])?;
        let inserted = insert_roles(&tx, &id_str, roles)?;
        tx.commit()?;
        Ok(Some(inserted))
      })
      .await
      .map_err(Error::from_write)?;

    inserted
      .ok_or(Error::AccountNotFound(account_id))?
      .into_iter()
      .map(RawRole::into_assignment)
      .collect()
  }

  async fn list_roles(&self, account_id: Uuid) -> Result<Vec<RoleAssignment>> {
    let id_str = encode_uuid(account_id);

    let raws: Vec<RawRole> = self
      .conn
      .call(move |conn| Ok(select_roles(conn, &id_str)?))
      .await?;

    raws.into_iter().map(RawRole::into_assignment).collect()
  }

  // ── Queries ───────────────────────────────────────────────────────────────

  async fn search(&self, query: &AccountQuery) -> Result<Vec<Account>> {
    let (where_clause, params) = search_clause(query);
    let sql = format!(
      "SELECT {ACCOUNT_COLUMNS} FROM accounts a {where_clause} ORDER BY a.email"
    );

    let raws: Vec<RawAccount> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAccount::into_account).collect()
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn find_duplicate_emails(&self) -> Result<Vec<DuplicateGroup>> {
    let raw_groups: Vec<(String, Vec<(RawAccount, Vec<RawRole>)>)> = self
      .conn
      .call(|conn| {
        let emails = conn
          .prepare(
            "SELECT lower(email) FROM accounts
             GROUP BY lower(email) HAVING COUNT(*) > 1
             ORDER BY lower(email)",
          )?
          .query_map([], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE lower(a.email) = ?1"
        ))?;
        let mut groups = Vec::with_capacity(emails.len());
        for email in emails {
          let accounts = stmt
            .query_map(rusqlite::params![email], RawAccount::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          let mut members = Vec::with_capacity(accounts.len());
          for account in accounts {
            let roles = select_roles(conn, &account.account_id)?;
            members.push((account, roles));
          }
          groups.push((email, members));
        }
        Ok(groups)
      })
      .await?;

    raw_groups
      .into_iter()
      .map(|(email, members)| {
        let accounts = members
          .into_iter()
          .map(|(account, roles)| {
            Ok(DuplicateAccount {
              account: account.into_account()?,
              roles:   roles
                .into_iter()
                .map(RawRole::into_assignment)
                .collect::<Result<_>>()?,
            })
          })
          .collect::<Result<_>>()?;
        Ok(DuplicateGroup { email, accounts })
      })
      .collect()
  }

  async fn merge_duplicates(&self, plans: Vec<MergePlan>) -> Result<()> {
    if plans.is_empty() {
      return Ok(());
    }

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for plan in &plans {
          for old_id in &plan.replaces {
            let old_id = encode_uuid(*old_id);
            tx.execute("DELETE FROM roles WHERE account_id = ?1", rusqlite::params![old_id])?;
            tx.execute("DELETE FROM accounts WHERE account_id = ?1", rusqlite::params![old_id])?;
          }
        }
        for plan in plans {
          let merged = plan.merged;
          let id_str = encode_uuid(merged.account_id);
          tx.execute(
            "INSERT INTO accounts (account_id, email, full_name, external_subject_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
              id_str,
              merged.email,
              merged.full_name,
              merged.external_subject_id,
              encode_dt(merged.created_at),
            ],
          )?;
          insert_roles(&tx, &id_str, plan.roles)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from_write)?;

    Ok(())
  }

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
