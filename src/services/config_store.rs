// Configuration Storage Service
// Handles config file read/write, version backup and environment overrides

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const API_URL_ENV: &str = "DETECTAI_API_URL";
const CONFIG_DIR_ENV: &str = "DETECTAI_CONFIG_DIR";
const BACKUP_KEEP: usize = 10;
const BACKUP_PREFIX: &str = "config_";

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid backend URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigurationError + '_ {
    move |source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            backend: BackendConfig::default(),
            proxy: None,
            validation: ValidationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout; the transport default applies when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            max_upload_bytes: None,
        }
    }
}

fn default_version() -> String { env!("CARGO_PKG_VERSION").to_string() }
fn default_base_url() -> String { DEFAULT_BACKEND_URL.to_string() }
fn default_min_text_chars() -> usize { 1 }

impl AppConfig {
    /// Apply environment overrides on top of the stored values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                info!(url, "config.backend_url_from_env");
                self.backend.base_url = url.to_string();
            }
        }
        self
    }

    /// Proxy URL if a proxy is configured and enabled.
    pub fn active_proxy(&self) -> Option<&str> {
        self.proxy
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }

    /// Parsed backend base URL; only http and https are accepted.
    pub fn backend_url(&self) -> Result<Url, ConfigurationError> {
        let raw = self.backend.base_url.trim();
        let url = Url::parse(raw).map_err(|e| ConfigurationError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigurationError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Store rooted at `DETECTAI_CONFIG_DIR`, or the platform config dir.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        match env::var(CONFIG_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Ok(Self::new(PathBuf::from(dir))),
            _ => Self::default_config_dir()
                .map(Self::new)
                .ok_or(ConfigurationError::NoConfigDir),
        }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("detectAI"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigurationError> {
        fs::create_dir_all(&self.config_dir).map_err(io_err(&self.config_dir))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, ConfigurationError> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(io_err(&self.config_file))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load, falling back to defaults when the file is unreadable.
    pub fn load_or_default(&self) -> AppConfig {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, path = %self.config_file.display(), "config.load_failed");
            AppConfig::default()
        })
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.config_dir.join("backups")
    }

    /// Write `config`, first copying the current file into `backups/`.
    /// Returns the backup that was taken, if any.
    pub fn save(&self, config: &AppConfig) -> Result<Option<PathBuf>, ConfigurationError> {
        self.ensure_dir()?;
        let backup = match self.config_file.exists() {
            true => Some(self.backup_current()?),
            false => None,
        };

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(io_err(&self.config_file))?;
        info!(path = %self.config_file.display(), "config.saved");
        Ok(backup)
    }

    fn backup_current(&self) -> Result<PathBuf, ConfigurationError> {
        let dir = self.backups_dir();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let target = dir.join(format!("{BACKUP_PREFIX}{stamp}.json"));
        fs::copy(&self.config_file, &target).map_err(io_err(&target))?;

        self.prune_backups()?;
        Ok(target)
    }

    /// Backup files, oldest first. Names embed a UTC timestamp, so name order is age order.
    pub fn backups(&self) -> Result<Vec<PathBuf>, ConfigurationError> {
        let dir = self.backups_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(io_err(&dir))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(BACKUP_PREFIX) && n.ends_with(".json"))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn prune_backups(&self) -> Result<(), ConfigurationError> {
        let backups = self.backups()?;
        let excess = backups.len().saturating_sub(BACKUP_KEEP);
        for stale in &backups[..excess] {
            if let Err(e) = fs::remove_file(stale) {
                warn!(path = %stale.display(), error = %e, "config.backup_prune_failed");
            }
        }
        Ok(())
    }

    /// Persist a new backend base URL. Nothing is written if the URL is rejected.
    pub fn set_backend_url(&self, url: &str) -> Result<Url, ConfigurationError> {
        let mut config = self.load()?;
        config.backend.base_url = url.trim().to_string();
        let parsed = config.backend_url()?;
        self.save(&config)?;
        info!(backend = %parsed, "config.backend_url_saved");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, MutexGuard};

    // Tests that touch process env vars run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets (or removes) one env var and puts the previous value back on drop.
    struct EnvVar {
        name: &'static str,
        saved: Option<OsString>,
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvVar {
        fn set(name: &'static str, value: Option<&str>) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let saved = env::var_os(name);
            match value {
                Some(v) => env::set_var(name, v),
                None => env::remove_var(name),
            }
            Self { name, saved, _lock: lock }
        }
    }

    impl Drop for EnvVar {
        fn drop(&mut self) {
            match self.saved.take() {
                Some(v) => env::set_var(self.name, v),
                None => env::remove_var(self.name),
            }
        }
    }

    fn scratch_dir() -> PathBuf {
        env::temp_dir().join(format!("detectai-config-{}", uuid::Uuid::new_v4()))
    }

    fn stored_config(base_url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.backend.base_url = base_url.to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.backend.timeout_secs, None);
        assert_eq!(config.validation.min_text_chars, 1);
        assert!(config.active_proxy().is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"backend": {"timeoutSecs": 30}}"#).unwrap();
        assert_eq!(parsed.backend.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(parsed.backend.timeout_secs, Some(30));
        assert_eq!(parsed.validation.min_text_chars, 1);
    }

    #[test]
    fn test_save_and_load_with_backup() {
        let dir = scratch_dir();
        let store = ConfigStore::new(dir.clone());
        assert_eq!(store.load().unwrap().backend.base_url, DEFAULT_BACKEND_URL);

        assert_eq!(store.save(&AppConfig::default()).unwrap(), None);
        let url = store.set_backend_url(" https://detect.example.com ").unwrap();
        assert_eq!(url.as_str(), "https://detect.example.com/");

        let loaded = store.load().unwrap();
        assert_eq!(loaded.backend.base_url, "https://detect.example.com");

        let backups = store.backups().unwrap();
        assert_eq!(backups.len(), 1);
        let previous: AppConfig = serde_json::from_str(&fs::read_to_string(&backups[0]).unwrap()).unwrap();
        assert_eq!(previous.backend.base_url, DEFAULT_BACKEND_URL);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_backups_are_pruned() {
        let dir = scratch_dir();
        let store = ConfigStore::new(dir.clone());
        for i in 0..(BACKUP_KEEP + 3) {
            store.save(&stored_config(&format!("http://host-{i}:8000"))).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let backups = store.backups().unwrap();
        assert_eq!(backups.len(), BACKUP_KEEP);

        // The newest backup holds the config written just before the last save.
        let newest: AppConfig =
            serde_json::from_str(&fs::read_to_string(backups.last().unwrap()).unwrap()).unwrap();
        assert_eq!(newest.backend.base_url, format!("http://host-{}:8000", BACKUP_KEEP + 1));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_set_backend_url_rejects_without_writing() {
        let dir = scratch_dir();
        let store = ConfigStore::new(dir.clone());
        assert!(matches!(
            store.set_backend_url("ftp://example.com"),
            Err(ConfigurationError::InvalidUrl { .. })
        ));
        assert!(!store.config_file().exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_api_url_env_override() {
        let _var = EnvVar::set(API_URL_ENV, Some("  https://detect.example.com  "));
        let config = stored_config("http://stored:1").with_env_overrides();
        assert_eq!(config.backend.base_url, "https://detect.example.com");
    }

    #[test]
    fn test_blank_api_url_env_keeps_stored_value() {
        for value in ["", "   "] {
            let _var = EnvVar::set(API_URL_ENV, Some(value));
            let config = stored_config("http://stored:1").with_env_overrides();
            assert_eq!(config.backend.base_url, "http://stored:1", "value {value:?}");
        }

        let _var = EnvVar::set(API_URL_ENV, None);
        let config = stored_config("http://stored:1").with_env_overrides();
        assert_eq!(config.backend.base_url, "http://stored:1");
    }

    #[test]
    fn test_config_dir_from_env() {
        let dir = scratch_dir();
        {
            let _var = EnvVar::set(CONFIG_DIR_ENV, dir.to_str());
            let store = ConfigStore::from_env().unwrap();
            assert_eq!(store.config_file(), dir.join("config.json").as_path());

            store.set_backend_url("http://10.0.0.5:8000").unwrap();
        }
        let reloaded = ConfigStore::new(dir.clone()).load().unwrap();
        assert_eq!(reloaded.backend.base_url, "http://10.0.0.5:8000");

        let _var = EnvVar::set(CONFIG_DIR_ENV, Some("  "));
        match ConfigStore::default_config_dir() {
            Some(default_dir) => assert_eq!(
                ConfigStore::from_env().unwrap().config_file(),
                default_dir.join("config.json").as_path()
            ),
            None => assert!(matches!(ConfigStore::from_env(), Err(ConfigurationError::NoConfigDir))),
        }

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_active_proxy() {
        let mut config = AppConfig::default();
        config.proxy = Some(ProxyConfig {
            enabled: true,
            url: Some("http://127.0.0.1:3128".to_string()),
        });
        assert_eq!(config.active_proxy(), Some("http://127.0.0.1:3128"));

        config.proxy = Some(ProxyConfig {
            enabled: false,
            url: Some("http://127.0.0.1:3128".to_string()),
        });
        assert_eq!(config.active_proxy(), None);

        config.proxy = Some(ProxyConfig {
            enabled: true,
            url: Some("   ".to_string()),
        });
        assert_eq!(config.active_proxy(), None);

        config.proxy = Some(ProxyConfig { enabled: true, url: None });
        assert_eq!(config.active_proxy(), None);
    }

    #[test]
    fn test_rejects_bad_backend_url() {
        let mut config = AppConfig::default();
        config.backend.base_url = "ftp://example.com".to_string();
        assert!(matches!(config.backend_url(), Err(ConfigurationError::InvalidUrl { .. })));
        config.backend.base_url = "not a url".to_string();
        assert!(config.backend_url().is_err());
    }

    #[test]
    fn test_corrupt_file_reports_parse_error() {
        let dir = scratch_dir();
        let store = ConfigStore::new(dir.clone());
        store.ensure_dir().unwrap();
        fs::write(store.config_file(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(ConfigurationError::Json(_))));
        assert_eq!(store.load_or_default().backend.base_url, DEFAULT_BACKEND_URL);
        let _ = fs::remove_dir_all(&dir);
    }
}
