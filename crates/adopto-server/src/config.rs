use std::{env, fmt::Display, num::NonZeroU64, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use tracing::debug;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub public_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub reject_extra_files: bool,
    pub cors_origin: String,
    pub cookie_secure: bool,
    pub idempotency_window_secs: u64,
    pub sweep_interval_secs: NonZeroU64,
    pub sweep_grace_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            host: try_load("ADOPTO_HOST", "0.0.0.0")?,
            port: try_load("ADOPTO_PORT", "3000")?,
            db_path: try_load("ADOPTO_DB_PATH", "adopto.db")?,
            uploads_dir: try_load("ADOPTO_UPLOADS_DIR", "uploads")?,
            public_dir: try_load("ADOPTO_PUBLIC_DIR", "public")?,
            max_upload_bytes: try_load("ADOPTO_MAX_UPLOAD_BYTES", "10485760")?,
            reject_extra_files: try_load("ADOPTO_REJECT_EXTRA_FILES", "false")?,
            cors_origin: try_load("ADOPTO_CORS_ORIGIN", "http://localhost:3000")?,
            cookie_secure: try_load("ADOPTO_COOKIE_SECURE", "false")?,
            idempotency_window_secs: try_load("ADOPTO_IDEMPOTENCY_WINDOW_SECS", "86400")?,
            sweep_interval_secs: try_load("ADOPTO_SWEEP_INTERVAL_SECS", "3600")?,
            sweep_grace_secs: try_load("ADOPTO_SWEEP_GRACE_SECS", "600")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse_value(key, &raw)
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw:?}"))
}
