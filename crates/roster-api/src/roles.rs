//! Handler for `PUT /accounts/roles`.
//!
//! The body maps each email to a role token or a list of tokens. The whole
//! request is validated before any account is written.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use roster_core::{
  AccountService, Error,
  bulk::{BulkRoleOutcome, BulkRoleRequest},
  store::AccountStore,
};

use crate::error::ApiError;

/// `PUT /accounts/roles`. Body: `{"a@x.com": "ADMIN", "b@x.com": ["COF_ASSESSOR"]}`
pub async fn bulk_update<S>(
  State(service): State<AccountService<S>>,
  body: Result<Json<BulkRoleRequest>, JsonRejection>,
) -> Result<Json<BulkRoleOutcome>, ApiError>
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let Json(request) = body?;
  Ok(Json(service.bulk_update_roles(request).await?))
}
