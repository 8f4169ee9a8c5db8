//! Handlers for single-account endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/accounts` | `?account_id=&email_address=&external_subject_id=`; all given must match |
//! | `POST` | `/accounts` | Body: `{"email_address": "...", "external_subject_id": "..."}` |
//! | `PUT`  | `/accounts/{id}` | Body: [`AccountUpdate`]; 201 with the account view |
//! | `GET`  | `/accounts/{id}/highest-roles` | Namespace → highest privilege |
//! | `GET`  | `/bulk-accounts` | `?account_ids=<id>,<id>`; map of id → view |

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  AccountService, Error,
  account::{AccountLookup, AccountView},
  highest::HighestRoleMap,
  service::AccountUpdate,
  store::AccountStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Get by identifier ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
  pub account_id:          Option<Uuid>,
  pub email_address:       Option<String>,
  pub external_subject_id: Option<String>,
}

/// Blank query values count as absent.
fn present(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

impl From<LookupParams> for AccountLookup {
  fn from(params: LookupParams) -> Self {
    let mut lookup = present(params.email_address)
      .as_deref()
      .map(AccountLookup::by_email)
      .unwrap_or_default();
    lookup.account_id = params.account_id;
    lookup.external_subject_id = present(params.external_subject_id);
    lookup
  }
}

/// `GET /accounts?account_id=...&email_address=...&external_subject_id=...`
pub async fn get_by<S>(
  State(service): State<AccountService<S>>,
  params: Result<Query<LookupParams>, QueryRejection>,
) -> Result<Json<AccountView>, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let Query(params) = params?;
  let view = service.get_account_by(params.into()).await?;
  Ok(Json(view))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub email_address:       String,
  pub external_subject_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Created {
  pub account_id:          Uuid,
  pub email_address:       String,
  pub external_subject_id: Option<String>,
}

/// `POST /accounts`
pub async fn create<S>(
  State(service): State<AccountService<S>>,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let Json(body) = body?;
  let account = service
    .create_account(&body.email_address, body.external_subject_id.as_deref())
    .await?;
  let created = Created {
    account_id:          account.account_id,
    email_address:       account.email,
    external_subject_id: account.external_subject_id,
  };
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT /accounts/{id}`
pub async fn update<S>(
  State(service): State<AccountService<S>>,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<AccountUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let Path(id) = id?;
  let Json(body) = body?;
  let view = service.update_account(id, body).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

// ─── Highest roles ───────────────────────────────────────────────────────────

/// `GET /accounts/{id}/highest-roles`
pub async fn highest_roles<S>(
  State(service): State<AccountService<S>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<HighestRoleMap>, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let Path(id) = id?;
  Ok(Json(service.highest_role_map(id).await?))
}

// ─── Bulk get ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkParams {
  /// Comma-separated account ids.
  pub account_ids: String,
}

/// `GET /bulk-accounts?account_ids=<id>,<id>`
pub async fn get_many<S>(
  State(service): State<AccountService<S>>,
  params: Result<Query<BulkParams>, QueryRejection>,
) -> Result<Json<BTreeMap<Uuid, AccountView>>, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let Query(params) = params?;
  let ids = params
    .account_ids
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      Uuid::parse_str(s).map_err(|e| ApiError::BadRequest(format!("invalid account id {s:?}: {e}")))
    })
    .collect::<Result<Vec<_>, _>>()?;
  Ok(Json(service.get_accounts(ids).await?))
}
