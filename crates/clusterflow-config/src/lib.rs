pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Clusters management endpoint used when none is configured
pub const DEFAULT_URL: &str = "https://api.openshift.com";

pub const URL_ENV: &str = "OCM_URL";
pub const TOKEN_ENV: &str = "OCM_TOKEN";
/// Setting this to `DEBUG` (any case) turns on debug logging
pub const LOG_ENV: &str = "TF_LOG";
/// Direct path to the config file
pub const CONFIG_PATH_ENV: &str = "CLUSTERFLOW_CONFIG_PATH";

const CONFIG_FILE: &str = "config.yaml";

/// Connection settings for the clusters management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    /// Bearer token; requests go out unauthenticated without one
    pub token: Option<String>,
    pub debug: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            token: None,
            debug: false,
        }
    }
}

/// Config file layout; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    url: Option<String>,
    token: Option<String>,
    debug: Option<bool>,
}

impl ProviderConfig {
    /// Loads the configuration
    ///
    /// Priority:
    /// 1. Environment: `OCM_URL`, `OCM_TOKEN`, `TF_LOG`
    /// 2. Config file (see [`find_config_file`])
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Reads a YAML config file, filling missing keys with defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: FileConfig = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if file.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(ConfigError::EmptyUrl {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!("Loaded config file {}", path.display());
        let defaults = Self::default();
        Ok(Self {
            url: file.url.unwrap_or(defaults.url),
            token: file.token.filter(|token| !token.is_empty()),
            debug: file.debug.unwrap_or(defaults.debug),
        })
    }

    fn apply_env(&mut self) {
        if let Some(url) = env_value(URL_ENV) {
            self.url = url;
        }
        if let Some(token) = env_value(TOKEN_ENV) {
            self.token = Some(token);
        }
        if let Some(level) = env_value(LOG_ENV) {
            self.debug = level.eq_ignore_ascii_case("debug");
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Directory holding the Clusterflow config file
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("clusterflow");
    Ok(config_dir)
}

/// Looks up the config file
///
/// 1. `CLUSTERFLOW_CONFIG_PATH` when it points at an existing file
/// 2. `~/.config/clusterflow/config.yaml`
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(config_path) = env_value(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points to a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    let global_config = get_config_dir().ok()?.join(CONFIG_FILE);
    global_config.exists().then_some(global_config)
}

/// Installs the global fmt subscriber
///
/// `RUST_LOG` directives win; otherwise the level is DEBUG when the config
/// enables debugging and INFO when not.
pub fn init_tracing(config: &ProviderConfig) {
    let level = if config.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn clear_env() {
        unsafe {
            for name in [URL_ENV, TOKEN_ENV, LOG_ENV, CONFIG_PATH_ENV] {
                std::env::remove_var(name);
            }
        }
    }

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("clusterflow"));
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.url, "https://api.openshift.com");
        assert_eq!(config.token, None);
        assert!(!config.debug);
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &temp_dir,
            "url: https://api.stage.openshift.com\ntoken: secret\ndebug: true\n",
        );

        let config = ProviderConfig::from_file(&path).unwrap();
        assert_eq!(config.url, "https://api.stage.openshift.com");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert!(config.debug);
    }

    #[test]
    fn test_from_file_partial() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_config(&temp_dir, "token: secret\n");

        let config = ProviderConfig::from_file(&path).unwrap();
        assert_eq!(config.url, DEFAULT_URL);
        assert!(!config.debug);
    }

    #[test]
    fn test_from_file_errors() {
        let temp_dir = tempfile::tempdir().unwrap();

        let path = write_config(&temp_dir, "debug: [not, a, bool]\n");
        assert!(matches!(
            ProviderConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));

        let path = write_config(&temp_dir, "url: ''\n");
        assert!(matches!(
            ProviderConfig::from_file(&path),
            Err(ConfigError::EmptyUrl { .. })
        ));

        let missing = temp_dir.path().join("missing.yaml");
        assert!(matches!(
            ProviderConfig::from_file(&missing),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &temp_dir,
            "url: https://file.example.com\ntoken: from-file\ndebug: true\n",
        );

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, path.to_str().unwrap());
            std::env::set_var(URL_ENV, "https://env.example.com");
            std::env::set_var(LOG_ENV, "info");
        }

        let config = ProviderConfig::load().unwrap();
        assert_eq!(config.url, "https://env.example.com");
        assert_eq!(config.token.as_deref(), Some("from-file"));
        assert!(!config.debug);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_debug_toggle_is_case_insensitive() {
        clear_env();
        unsafe {
            std::env::set_var(LOG_ENV, "Debug");
            std::env::set_var(TOKEN_ENV, "from-env");
        }

        let config = ProviderConfig::load().unwrap();
        assert!(config.debug);
        assert_eq!(config.token.as_deref(), Some("from-env"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_config_path_falls_through() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        unsafe {
            std::env::set_var(
                CONFIG_PATH_ENV,
                temp_dir.path().join("nope.yaml").to_str().unwrap(),
            );
        }

        let found = find_config_file();
        assert_ne!(found, Some(temp_dir.path().join("nope.yaml")));

        clear_env();
    }

    #[test]
    fn test_init_tracing_twice() {
        let config = ProviderConfig::default();
        init_tracing(&config);
        init_tracing(&config);
    }
}
