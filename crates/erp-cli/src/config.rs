// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::logging::{self, LogSettings};
use anyhow::{Context, Result, anyhow, bail};
use erp_app::{CompanyId, DEFAULT_PAGE_SIZE, EmployeeId, MAX_PAGE_SIZE, ModuleKind};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "5s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Local,
    Remote,
}

impl BackendMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            session: Session::default(),
            backend: Backend::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub max_document_size: Option<i64>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            db_path: None,
            max_document_size: Some(erp_db::MAX_DOCUMENT_SIZE),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    pub employee_id: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    pub mode: Option<String>,
    pub url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            mode: Some("local".to_owned()),
            url: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<i64>,
    pub start_module: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE as i64),
            start_module: Some("parts".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
    pub json: Option<bool>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(logging::DEFAULT_LEVEL.to_owned()),
            file: None,
            json: Some(false),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ERP_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ERP_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(erp_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and keep values under [storage], [session], [backend], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with `erp --print-example-config`",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            erp_db::validate_db_path(db_path)?;
        }

        if let Some(max_size) = self.storage.max_document_size
            && max_size <= 0
        {
            bail!(
                "storage.max_document_size in {} must be positive, got {}",
                path.display(),
                max_size
            );
        }

        if let Some(mode) = &self.backend.mode
            && BackendMode::parse(mode).is_none()
        {
            bail!(
                "backend.mode in {} must be \"local\" or \"remote\", got {:?}",
                path.display(),
                mode
            );
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.ui.page_size
            && (page_size <= 0 || page_size > MAX_PAGE_SIZE as i64)
        {
            bail!(
                "ui.page_size in {} must be between 1 and {}, got {}",
                path.display(),
                MAX_PAGE_SIZE,
                page_size
            );
        }

        if let Some(module) = &self.ui.start_module
            && ModuleKind::parse(module).is_none()
        {
            bail!(
                "ui.start_module in {} must be \"parts\" or \"employees\", got {:?}",
                path.display(),
                module
            );
        }

        if let Some(employee_id) = &self.session.employee_id
            && employee_id.trim().is_empty()
        {
            bail!(
                "session.employee_id in {} must not be empty; remove the key to use the default operator",
                path.display()
            );
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => erp_db::default_db_path(),
        }
    }

    pub fn max_document_size(&self) -> i64 {
        self.storage
            .max_document_size
            .unwrap_or(erp_db::MAX_DOCUMENT_SIZE)
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.session
            .employee_id
            .as_deref()
            .map(|id| EmployeeId::new(id.trim()))
    }

    /// Company used for new sessions; the demo company when unset.
    pub fn company_id(&self) -> CompanyId {
        self.session
            .company_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| CompanyId::new(erp_db::DEFAULT_COMPANY), CompanyId::new)
    }

    pub fn backend_mode(&self) -> BackendMode {
        self.backend
            .mode
            .as_deref()
            .and_then(BackendMode::parse)
            .unwrap_or(BackendMode::Local)
    }

    /// `[backend].url`, falling back to `ERP_BACKEND_URL`.
    pub fn backend_url(&self) -> Result<String> {
        if let Some(url) = self.backend.url.as_deref().filter(|url| !url.trim().is_empty()) {
            return Ok(url.trim().trim_end_matches('/').to_owned());
        }
        crate::env::require(crate::env::BACKEND_URL)
            .map(|url| url.trim().trim_end_matches('/').to_owned())
            .context("remote mode needs [backend] url or ERP_BACKEND_URL")
    }

    pub fn backend_timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn page_size(&self) -> usize {
        self.ui
            .page_size
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn start_module(&self) -> ModuleKind {
        self.ui
            .start_module
            .as_deref()
            .and_then(ModuleKind::parse)
            .unwrap_or(ModuleKind::Parts)
    }

    pub fn log_settings(&self) -> Result<LogSettings> {
        let file = match &self.log.file {
            Some(path) => PathBuf::from(path),
            None => logging::default_log_path()?,
        };
        Ok(LogSettings {
            level: self
                .log
                .level
                .clone()
                .unwrap_or_else(|| logging::DEFAULT_LEVEL.to_owned()),
            file,
            json: self.log.json.unwrap_or(false),
        })
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# erp config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/erp/erp.db)\n# db_path = \"/absolute/path/to/erp.db\"\nmax_document_size = {}\n\n[session]\n# Optional. Defaults to the first active employee in the store.\n# employee_id = \"employee-...\"\n# company_id = \"company-1\"\n\n[backend]\n# \"local\" uses the SQLite store; \"remote\" talks to the hosted API.\n# The service key is read from ERP_SERVICE_ROLE_KEY, never from this file.\nmode = \"local\"\n# url = \"https://erp.example.com/v1\"\ntimeout = \"{}\"\n\n[ui]\npage_size = {}\nstart_module = \"parts\"\n\n[log]\n# ERP_LOG overrides this filter.\nlevel = \"{}\"\n# file = \"/absolute/path/to/erp.log\"\njson = false\n",
            path.display(),
            erp_db::MAX_DOCUMENT_SIZE,
            DEFAULT_TIMEOUT,
            DEFAULT_PAGE_SIZE,
            logging::DEFAULT_LEVEL,
        )
    }
}

/// Milliseconds per unit. `ms` is matched before `s` and `m`.
const DURATION_UNITS: [(&str, u64); 3] = [("ms", 1), ("s", 1_000), ("m", 60_000)];

fn parse_duration(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    let Some((count, unit_ms)) = DURATION_UNITS
        .iter()
        .find_map(|(suffix, unit_ms)| Some((trimmed.strip_suffix(suffix)?, *unit_ms)))
    else {
        bail!("invalid duration {raw:?}; write it as 250ms, 5s or 2m");
    };
    let count: u64 = count
        .trim()
        .parse()
        .with_context(|| format!("invalid duration {raw:?}; the count must be a whole number"))?;
    let millis = count
        .checked_mul(unit_ms)
        .ok_or_else(|| anyhow!("duration {raw:?} is too large"))?;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::{BackendMode, Config, parse_duration};
    use anyhow::Result;
    use erp_app::{CompanyId, EmployeeId, ModuleKind};
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.backend_mode(), BackendMode::Local);
        assert_eq!(config.page_size(), 20);
        assert_eq!(config.start_module(), ModuleKind::Parts);
        assert_eq!(config.employee_id(), None);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[ui]\npage_size = 10\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[storage]\nmax_document_size = 2048\n[session]\nemployee_id = \" emp-7 \"\ncompany_id = \"acme\"\n[backend]\nmode = \"remote\"\nurl = \"https://erp.example.com/v1/\"\ntimeout = \"250ms\"\n[ui]\npage_size = 50\nstart_module = \"employees\"\n[log]\nlevel = \"debug\"\nfile = \"/tmp/erp-test.log\"\njson = true\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.max_document_size(), 2048);
        assert_eq!(config.employee_id(), Some(EmployeeId::new("emp-7")));
        assert_eq!(config.company_id(), CompanyId::new("acme"));
        assert_eq!(config.backend_mode(), BackendMode::Remote);
        assert_eq!(config.backend_url()?, "https://erp.example.com/v1");
        assert_eq!(config.backend_timeout()?, Duration::from_millis(250));
        assert_eq!(config.page_size(), 50);
        assert_eq!(config.start_module(), ModuleKind::Employees);
        let log = config.log_settings()?;
        assert_eq!(log.level, "debug");
        assert_eq!(log.file, PathBuf::from("/tmp/erp-test.log"));
        assert!(log.json);
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> Result<()> {
        for (content, needle) in [
            ("version = 1\n[storage]\nmax_document_size = 0\n", "must be positive"),
            ("version = 1\n[backend]\nmode = \"cloud\"\n", "backend.mode"),
            ("version = 1\n[backend]\ntimeout = \"0s\"\n", "must be positive"),
            ("version = 1\n[ui]\npage_size = 0\n", "ui.page_size"),
            ("version = 1\n[ui]\nstart_module = \"vendors\"\n", "ui.start_module"),
            ("version = 1\n[session]\nemployee_id = \"  \"\n", "session.employee_id"),
        ] {
            let (_temp, path) = write_config(content)?;
            let error = Config::load(&path).expect_err("invalid config should fail");
            assert!(
                error.to_string().contains(needle),
                "{content:?}: unexpected message {error}"
            );
        }
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ERP_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ERP_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_uses_env_override_when_storage_db_path_missing() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ERP_DB_PATH", "/from/env-only.db");
        }
        let config = Config::load(&path)?;
        let resolved = config.db_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ERP_DB_PATH");
        }
        assert_eq!(resolved, PathBuf::from("/from/env-only.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"https://evil.example/erp.db\"\n")?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        assert!(error.to_string().contains("looks like a URI"));
        Ok(())
    }

    #[test]
    fn backend_url_falls_back_to_env() -> Result<()> {
        let _guard = env_lock();
        let config = Config::default();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ERP_BACKEND_URL", "http://127.0.0.1:9/v1/");
        }
        let resolved = config.backend_url();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ERP_BACKEND_URL");
        }
        assert_eq!(resolved?, "http://127.0.0.1:9/v1");

        let error = config.backend_url().expect_err("no url anywhere should fail");
        assert!(format!("{error:#}").contains("ERP_BACKEND_URL"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        let cases = [
            ("250ms", Duration::from_millis(250)),
            (" 5s", Duration::from_secs(5)),
            ("2m", Duration::from_secs(120)),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse_duration(raw)?, expected, "{raw}");
        }
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("1.5s").is_err());
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.backend_mode(), BackendMode::Local);
        assert_eq!(config.page_size(), 20);
        Ok(())
    }
}
