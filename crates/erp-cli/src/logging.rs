// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "ERP_LOG";
pub const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub file: PathBuf,
    pub json: bool,
}

pub fn default_log_path() -> Result<PathBuf> {
    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set [log].file to a writable log path")
    })?;
    Ok(data_root.join(erp_db::APP_NAME).join("erp.log"))
}

/// `ERP_LOG` wins over the configured level.
pub fn build_filter(configured: &str, env_override: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = env_override.filter(|value| !value.trim().is_empty()) {
        return EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} filter {directives:?}"));
    }
    EnvFilter::try_new(configured)
        .with_context(|| format!("invalid [log].level {configured:?} -- use e.g. \"info\" or \"erp_db=debug\""))
}

/// Installs the global subscriber. The terminal belongs to the UI, so
/// events go to the log file only.
pub fn init(settings: &LogSettings) -> Result<()> {
    let env_override = std::env::var(LOG_ENV).ok();
    let filter = build_filter(&settings.level, env_override.as_deref())?;
    let writer = Mutex::new(open_log_file(&settings.file)?);

    let installed = if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|error| anyhow!("install log subscriber: {error}"))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].file to a writable path",
                path.display()
            )
        })
}
