//! Handler for `GET /healthcheck`.
//!
//! Reports one entry per check; any failing check turns the status into 500.

use axum::{Json, extract::State, http::StatusCode};
use roster_core::{AccountService, Error, store::AccountStore};
use serde_json::{Value, json};

const OK: &str = "OK";
const FAILED: &str = "Failed - check logs";

/// `GET /healthcheck`
pub async fn handler<S>(State(service): State<AccountService<S>>) -> (StatusCode, Json<Value>)
where
  S: AccountStore,
  Error: From<S::Error>,
{
  let mut status = StatusCode::OK;

  let db = match service.check_store().await {
    Ok(()) => OK,
    Err(e) => {
      tracing::error!(error = %e, "database health check failed");
      status = StatusCode::INTERNAL_SERVER_ERROR;
      FAILED
    }
  };

  let body = json!({
    "checks": [
      { "check_running": OK },
      { "check_db": db },
    ]
  });
  (status, Json(body))
}
