use std::path::PathBuf;

use anyhow::Result;

/// Runtime configuration, loaded from the environment with `.env` support
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub database_file: String,
    /// HTTP server bind address
    pub bind_address: String,
    /// Staging directory for raw DCE exports
    pub dce_download_dir: PathBuf,
    /// Long-term archive directory for DCE exports
    pub dce_archive_dir: PathBuf,
    /// Per-request timeout for bulletin downloads
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_file =
            std::env::var("DATABASE_FILE").unwrap_or_else(|_| "data.db".to_string());
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let dce_download_dir = std::env::var("DCE_DOWNLOAD_DIR")
            .unwrap_or_else(|_| "DCE_Dir".to_string())
            .into();
        let dce_archive_dir = std::env::var("DCE_ARCHIVE_DIR")
            .unwrap_or_else(|_| "DCE_Zip".to_string())
            .into();
        let http_timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            database_file,
            bind_address,
            dce_download_dir,
            dce_archive_dir,
            http_timeout_secs,
        })
    }
}
