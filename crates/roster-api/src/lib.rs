//! JSON REST API for the Roster account store.
//!
//! Exposes an axum [`Router`] backed by an [`AccountService`] over any
//! [`roster_core::store::AccountStore`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(roster_api::api_router(service.clone()))
//! ```

pub mod accounts;
pub mod error;
pub mod health;
pub mod roles;
pub mod search;

use axum::{
  Router,
  routing::{get, post, put},
};
use roster_core::{AccountService, Error, store::AccountStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: AccountService<S>) -> Router<()>
where
  S: AccountStore + 'static,
  Error: From<S::Error>,
{
  Router::new()
    // Accounts
    .route("/accounts", get(accounts::get_by::<S>).post(accounts::create::<S>))
    .route("/accounts/{id}", put(accounts::update::<S>))
    .route("/accounts/{id}/highest-roles", get(accounts::highest_roles::<S>))
    .route("/bulk-accounts", get(accounts::get_many::<S>))
    // Roles
    .route("/accounts/roles", put(roles::bulk_update::<S>))
    // Search
    .route("/accounts/search", post(search::handler::<S>))
    .route("/accounts/fund/{fund}", get(search::fund::<S>))
    // Health
    .route("/healthcheck", get(health::handler::<S>))
    .with_state(service)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use roster_core::{
    account::NewAccount,
    roles::RoleCatalog,
  };
  use roster_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  async fn make_service() -> AccountService<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AccountService::new(Arc::new(store), RoleCatalog::default())
  }

  async fn seed(service: &AccountService<SqliteStore>, email: &str, roles: &[&str]) -> Uuid {
    let account = service
      .store()
      .create_account(NewAccount::new(email, None).unwrap())
      .await
      .unwrap();
    service
      .store()
      .replace_roles(account.account_id, roles.iter().map(|r| (*r).to_owned()).collect())
      .await
      .unwrap();
    account.account_id
  }

  async fn send(
    service: &AccountService<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = api_router(service.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
  }

  // ── Accounts ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_then_get_by_email() {
    let svc = make_service().await;
    let (status, created) = send(
      &svc,
      "POST",
      "/accounts",
      Some(json!({ "email_address": "Jane@Example.com", "external_subject_id": "sub-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["email_address"], "jane@example.com");
    assert_eq!(created["external_subject_id"], "sub-1");

    let (status, view) =
      send(&svc, "GET", "/accounts?email_address=jane@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["account_id"], created["account_id"]);
    assert_eq!(view["roles"], json!([]));
    assert_eq!(view["highest_role_map"], json!({}));
  }

  #[tokio::test]
  async fn duplicate_create_is_conflict() {
    let svc = make_service().await;
    let body = json!({ "email_address": "a@x.com" });
    let (status, _) = send(&svc, "POST", "/accounts", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, err) = send(&svc, "POST", "/accounts", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "conflict");
  }

  #[tokio::test]
  async fn get_without_parameters_is_bad_request() {
    let svc = make_service().await;
    let (status, err) = send(&svc, "GET", "/accounts", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");
  }

  #[tokio::test]
  async fn get_with_blank_parameters_is_bad_request() {
    let svc = make_service().await;
    seed(&svc, "a@x.com", &[]).await;
    let (status, err) =
      send(&svc, "GET", "/accounts?email_address=&external_subject_id=%20", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation");
  }

  #[tokio::test]
  async fn get_unknown_account_is_not_found() {
    let svc = make_service().await;
    let uri = format!("/accounts?account_id={}", Uuid::new_v4());
    let (status, err) = send(&svc, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "unknown_account");
  }

  #[tokio::test]
  async fn update_returns_created_view() {
    let svc = make_service().await;
    let id = seed(&svc, "a@x.com", &["COF_COMMENTER"]).await;

    let (status, view) = send(
      &svc,
      "PUT",
      &format!("/accounts/{id}"),
      Some(json!({
        "roles": ["COF_LEAD_ASSESSOR"],
        "full_name": "Jane Doe",
        "external_subject_id": "sub-1",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["full_name"], "Jane Doe");
    assert_eq!(view["roles"], json!(["COF_LEAD_ASSESSOR"]));
    assert_eq!(view["highest_role_map"], json!({ "COF": "LEAD_ASSESSOR" }));
  }

  #[tokio::test]
  async fn highest_roles_endpoint() {
    let svc = make_service().await;
    let id = seed(&svc, "a@x.com", &["COF_ASSESSOR", "COF_COMMENTER", "NSTF_LEAD_ASSESSOR"]).await;
    let (status, map) = send(&svc, "GET", &format!("/accounts/{id}/highest-roles"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(map, json!({ "COF": "ASSESSOR", "NSTF": "LEAD_ASSESSOR" }));
  }

  #[tokio::test]
  async fn bulk_accounts_omits_unknown_ids() {
    let svc = make_service().await;
    let a = seed(&svc, "a@x.com", &[]).await;
    let uri = format!("/bulk-accounts?account_ids={a},{}", Uuid::new_v4());
    let (status, map) = send(&svc, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let map = map.as_object().unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map[&a.to_string()]["email_address"], "a@x.com");
  }

  // ── Bulk roles ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn bulk_roles_success_echoes_request() {
    let svc = make_service().await;
    seed(&svc, "a@x.com", &[]).await;
    seed(&svc, "b@x.com", &[]).await;

    let body = json!({ "a@x.com": "ADMIN", "b@x.com": ["COF_ASSESSOR", "NSTF_COMMENTER"] });
    let (status, outcome) = send(&svc, "PUT", "/accounts/roles", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "status": "all updated", "accounts": body }));
  }

  #[tokio::test]
  async fn bulk_roles_invalid_role_is_bad_request() {
    let svc = make_service().await;
    let a = seed(&svc, "a@x.com", &["COF_COMMENTER"]).await;
    seed(&svc, "b@x.com", &[]).await;

    let body = json!({ "a@x.com": "ADMIN", "b@x.com": "BAD_ROLE" });
    let (status, err) = send(&svc, "PUT", "/accounts/roles", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_role");
    assert_eq!(err["role"], "BAD_ROLE");
    assert_eq!(err["identifier"], "b@x.com");

    let roles = svc.store().list_roles(a).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].role, "COF_COMMENTER");
  }

  #[tokio::test]
  async fn bulk_roles_unknown_email_is_not_found() {
    let svc = make_service().await;
    let body = json!({ "ghost@x.com": "ADMIN" });
    let (status, err) = send(&svc, "PUT", "/accounts/roles", Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["identifier"], "ghost@x.com");
  }

  #[tokio::test]
  async fn bulk_roles_malformed_body_is_bad_request() {
    let svc = make_service().await;
    let (status, err) = send(&svc, "PUT", "/accounts/roles", Some(json!(["a@x.com"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "bad_request");
  }

  // ── Search and fund listing ─────────────────────────────────────────────

  #[tokio::test]
  async fn search_accepts_missing_body_and_rejects_unknown_fields() {
    let svc = make_service().await;
    seed(&svc, "b@x.com", &["SECTION_151"]).await;
    seed(&svc, "a@x.com", &["COF_ASSESSOR_R1"]).await;

    let (status, all) = send(&svc, "POST", "/accounts/search", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all[0]["email_address"], "a@x.com");
    assert_eq!(all[1]["email_address"], "b@x.com");

    let (status, _) = send(&svc, "POST", "/accounts/search", Some(json!({ "blah": false }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let both = json!({ "roles": ["SECTION_151"], "partial_roles": ["R1"] });
    let (status, _) = send(&svc, "POST", "/accounts/search", Some(both)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, found) =
      send(&svc, "POST", "/accounts/search", Some(json!({ "roles": ["SECTION_151"] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn fund_listing_status_codes() {
    let svc = make_service().await;
    seed(&svc, "assessor@example.com", &["COF_ASSESSOR_R1"]).await;
    seed(&svc, "commenter@example.com", &["COF_COMMENTER_R1"]).await;

    let (status, found) = send(&svc, "GET", "/accounts/fund/COF", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 2);

    let (status, found) = send(
      &svc,
      "GET",
      "/accounts/fund/COF?include_assessors=true&include_commenters=false",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found[0]["email_address"], "assessor@example.com");

    let (status, _) = send(
      &svc,
      "GET",
      "/accounts/fund/COF?include_assessors=false&include_commenters=false",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&svc, "GET", "/accounts/fund/unknownfund", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Health ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn healthcheck_reports_each_check() {
    let svc = make_service().await;
    let (status, body) = send(&svc, "GET", "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      body,
      json!({ "checks": [{ "check_running": "OK" }, { "check_db": "OK" }] })
    );
  }
}
