//! HTTP server wiring for the Roster account store.
//!
//! Combines the JSON API from `roster-api` with request tracing, and defines
//! the configuration the `server` binary loads.

use std::path::PathBuf;

use axum::Router;
use roster_core::{AccountService, Error, roles::RoleCatalog, store::AccountStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROSTER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// Role catalog override. The built-in catalog applies when absent.
  #[serde(default)]
  pub roles:      Option<RoleCatalog>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("roster.db") }

impl ServerConfig {
  pub fn catalog(&self) -> RoleCatalog { self.roles.clone().unwrap_or_default() }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application [`Router`] with HTTP request tracing.
pub fn router<S>(service: AccountService<S>) -> Router
where
  S: AccountStore + 'static,
  Error: From<S::Error>,
{
  roster_api::api_router(service).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use roster_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  fn load(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn config_defaults_apply() {
    let cfg = load("");
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.store_path, PathBuf::from("roster.db"));
    assert_eq!(cfg.catalog(), RoleCatalog::default());
  }

  #[test]
  fn config_role_catalog_override() {
    let cfg = load(
      r#"
      host = "0.0.0.0"
      port = 9000
      store_path = "/tmp/roster.db"

      [roles]
      canonical = ["ADMIN"]
      canonical_prefixes = ["HSRA_"]

      [roles.aliases]
      REVIEWER = "HSRA_ASSESSOR"
      "#,
    );
    assert_eq!(cfg.address(), "0.0.0.0:9000");

    let catalog = cfg.catalog();
    let reviewer = catalog.normalize("Reviewer").unwrap();
    assert_eq!(reviewer.role, "HSRA_ASSESSOR");
    assert!(reviewer.is_deprecated());
    assert_eq!(catalog.normalize("hsra_commenter").unwrap().role, "HSRA_COMMENTER");
    assert!(catalog.normalize("COF_ASSESSOR").is_err());
    assert!(catalog.normalize("APPLICANT").is_err());
  }

  #[tokio::test]
  async fn traced_router_serves_healthcheck() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let service = AccountService::new(Arc::new(store), RoleCatalog::default());

    let req = Request::builder()
      .uri("/healthcheck")
      .body(Body::empty())
      .unwrap();
    let resp = router(service).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
