//! Configuration module for the member registry.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the administrative member routes
    pub admin_key: Option<String>,
    /// HS256 secret for bearer tokens; `None` means a per-process secret is generated
    pub jwt_secret: Option<String>,
    /// Bearer token lifetime in minutes
    pub jwt_ttl_minutes: i64,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory where profile photos are written and served from
    pub upload_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let admin_key = env::var("REGISTRY_ADMIN_KEY").ok();
        let jwt_secret = env::var("REGISTRY_JWT_SECRET").ok();

        let jwt_ttl_minutes = env::var("REGISTRY_JWT_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let db_path = env::var("REGISTRY_DB_PATH")
            .unwrap_or_else(|_| "./data/registry.sqlite".to_string())
            .into();

        let upload_dir = env::var("REGISTRY_UPLOAD_DIR")
            .unwrap_or_else(|_| "./uploads".to_string())
            .into();

        let bind_addr = env::var("REGISTRY_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid REGISTRY_BIND_ADDR format");

        let log_level = env::var("REGISTRY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            admin_key,
            jwt_secret,
            jwt_ttl_minutes,
            db_path,
            upload_dir,
            bind_addr,
            log_level,
        }
    }
}
