//! Roster account store server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the account API over HTTP.
//!
//! # Merging duplicate accounts
//!
//! To print the merge plan for accounts whose emails differ only by case:
//!
//! ```
//! cargo run -p roster-server --bin server -- --dedupe
//! ```
//!
//! Add `--apply` to replace the duplicates with their merged accounts.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use roster_core::AccountService;
use roster_server::ServerConfig;
use roster_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Roster account store server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the duplicate-account merge plan as JSON and exit.
  #[arg(long)]
  dedupe: bool,

  /// With `--dedupe`, apply the plan instead of only printing it.
  #[arg(long, requires = "dedupe")]
  apply: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROSTER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let service = AccountService::new(Arc::new(store), server_cfg.catalog());

  // Maintenance mode: merge duplicate accounts and exit.
  if cli.dedupe {
    let plans = service
      .plan_duplicate_merge()
      .await
      .context("failed to plan duplicate merge")?;
    println!("{}", serde_json::to_string_pretty(&plans)?);
    if cli.apply {
      let merged = plans.len();
      service
        .apply_duplicate_merge(plans)
        .await
        .context("failed to apply duplicate merge")?;
      tracing::info!(merged, "duplicate accounts merged");
    }
    return Ok(());
  }

  let app = roster_server::router(service);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
