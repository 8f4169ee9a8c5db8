//! Handlers for `POST /accounts/search` and `GET /accounts/fund/{fund}`.

use axum::{
  Json,
  body::Bytes,
  extract::{
    Path, Query, State,
    rejection::{PathRejection, QueryRejection},
  },
};
use roster_core::{
  AccountService, Error,
  account::AccountView,
  service::{AccountSearch, FundQuery},
  store::AccountStore,
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Search ──────────────────────────────────────────────────────────────────

/// `POST /accounts/search`
///
/// The body is optional; a missing or empty body lists every account. Unknown
/// fields are rejected with 400.
pub async fn handler<S>(
  State(service): State<AccountService<S>>,
  body: Bytes,
) -> Result<Json<Vec<AccountView>>, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let search: AccountSearch = if body.iter().all(u8::is_ascii_whitespace) {
    AccountSearch::default()
  } else {
    serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
  };
  Ok(Json(service.search(search).await?))
}

// ─── Fund listing ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FundParams {
  pub round_short_name:   Option<String>,
  #[serde(default = "included")]
  pub include_assessors:  bool,
  #[serde(default = "included")]
  pub include_commenters: bool,
}

fn included() -> bool { true }

/// `GET /accounts/fund/{fund}[?round_short_name=...][&include_assessors=...][&include_commenters=...]`
pub async fn fund<S>(
  State(service): State<AccountService<S>>,
  fund: Result<Path<String>, PathRejection>,
  params: Result<Query<FundParams>, QueryRejection>,
) -> Result<Json<Vec<AccountView>>, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let Path(fund) = fund?;
  let Query(params) = params?;
  let query = FundQuery {
    fund_short_name:    fund,
    round_short_name:   params.round_short_name,
    include_assessors:  params.include_assessors,
    include_commenters: params.include_commenters,
  };
  Ok(Json(service.accounts_for_fund(query).await?))
}
