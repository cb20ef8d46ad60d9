//! dossier-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the Dossier JSON API over HTTP.
//!
//! The alias table is builtin by default; point `alias_table` at a TOML
//! file to ship a customised mapping without rebuilding:
//!
//! ```toml
//! [[entries]]
//! fact_key = "company_name"
//! labels   = ["company name", "razon social"]
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use dossier_core::{alias::AliasTable, matcher::FieldMatcher};
use dossier_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Dossier company-fact server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:        String,
  #[serde(default = "default_port")]
  port:        u16,
  #[serde(default = "default_store_path")]
  store_path:  PathBuf,
  /// Optional TOML file replacing the builtin alias table.
  #[serde(default)]
  alias_table: Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 7430 }
fn default_store_path() -> PathBuf { PathBuf::from("dossier.db") }

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
    .add_source(config::Environment::with_prefix("DOSSIER"))
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

  // Alias table: configured file or builtin.
  let table = match &server_cfg.alias_table {
    Some(path) => {
      let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read alias table {path:?}"))?;
      toml::from_str::<AliasTable>(&text)
        .with_context(|| format!("failed to parse alias table {path:?}"))?
    }
    None => AliasTable::builtin(),
  };
  tracing::info!(keys = table.len(), "alias table loaded");

  let matcher = Arc::new(FieldMatcher::new(&table));
  let store = Arc::new(store);

  let app = dossier_api::api_router(store, matcher)
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

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
