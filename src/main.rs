#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Anchor server entrypoint (systemd-friendly).
//! Loads the anchor key, opens the backend, and serves until interrupted.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};

use anchorstore::core::keystore;
use anchorstore::core::types::QuotaLimits;
use anchorstore::server::{AnchorServer, ServerConfig};
use anchorstore::storage::memory::MemoryBackend;
use anchorstore::storage::sled_store::SledBackend;
use anchorstore::storage::StorageBackend;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    node: NodeSection,
    http: HttpSection,
    storage: StorageSection,
    quotas: Option<QuotaLimits>,
    public_cors_origin: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NodeSection {
    data_dir: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HttpSection {
    listen_addr: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StorageSection {
    /// "sled" (default) or "memory".
    backend: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "sled".to_string(),
        }
    }
}

fn load_config() -> FileConfig {
    let path = env("ANCHOR_CONFIG", "");
    if path.is_empty() {
        return FileConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(raw) => match toml::from_str(&raw) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(%path, ?e, "config file is not valid TOML");
                std::process::exit(2);
            }
        },
        Err(e) => {
            error!(%path, ?e, "cannot read config file");
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let mut cfg = load_config();
    // Env overrides beat the file for containerized deployments.
    cfg.node.data_dir = env("ANCHOR_DATA_DIR", &cfg.node.data_dir);
    cfg.http.listen_addr = env("ANCHOR_LISTEN_ADDR", &cfg.http.listen_addr);
    cfg.storage.backend = env("ANCHOR_BACKEND", &cfg.storage.backend);

    info!(
        build = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown"),
        data_dir = %cfg.node.data_dir,
        "anchorstore starting"
    );

    let anchor_account = match keystore::load_or_create(&cfg.node.data_dir) {
        Ok(account) => account,
        Err(e) => {
            error!(?e, "failed to load anchor key");
            std::process::exit(1);
        }
    };
    info!(anchor = %anchor_account.public_key_string(), "anchor key loaded");

    let quotas = cfg.quotas.unwrap_or_default();
    let backend: Arc<dyn StorageBackend> = match cfg.storage.backend.as_str() {
        "memory" => Arc::new(MemoryBackend::new(quotas)),
        "sled" => {
            let db_path = format!("{}/objects", cfg.node.data_dir);
            match SledBackend::open(&db_path, quotas) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    error!(?e, %db_path, "failed to open storage backend");
                    std::process::exit(1);
                }
            }
        }
        other => {
            error!(backend = %other, "unknown backend (expected 'sled' or 'memory')");
            std::process::exit(2);
        }
    };

    let mut server_config = ServerConfig::new(backend, anchor_account);
    server_config.quotas = quotas;
    server_config.public_cors_origin = cfg.public_cors_origin.clone();

    let server = match AnchorServer::new(server_config) {
        Ok(server) => server,
        Err(e) => {
            error!(%e, "invalid server configuration");
            std::process::exit(2);
        }
    };

    let listener = match tokio::net::TcpListener::bind(&cfg.http.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %cfg.http.listen_addr, ?e, "cannot bind listen address");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.serve(listener) => {
            if let Err(e) = result {
                error!(%e, "server stopped");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
}
