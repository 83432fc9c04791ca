use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// 512 MiB, the largest upload the host accepts by default.
const DEFAULT_MAX_CONTENT_LENGTH: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub admin_token: String,
    pub max_content_length: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let admin_token = env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set")?;
        if admin_token.trim().is_empty() {
            anyhow::bail!("ADMIN_TOKEN must not be empty");
        }

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            admin_token,
            max_content_length: env::var("MAX_CONTENT_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONTENT_LENGTH),
        })
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("data.db")
    }
}
