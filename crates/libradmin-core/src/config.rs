//! Configuration management for libradmin.
//!
//! Loads configuration from ${LIBRADMIN_HOME}/config.toml with sensible defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `api_url`.
pub const API_URL_ENV: &str = "LIBRADMIN_API_URL";

pub mod paths {
    //! Path resolution for libradmin configuration and state.
    //!
    //! LIBRADMIN_HOME resolution order:
    //! 1. LIBRADMIN_HOME environment variable (if set)
    //! 2. ~/.config/libradmin (default)

    use std::path::PathBuf;

    /// Returns the libradmin home directory.
    pub fn libradmin_home() -> PathBuf {
        if let Ok(home) = std::env::var("LIBRADMIN_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".libradmin"),
            |h| h.join(".config").join("libradmin"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        libradmin_home().join("config.toml")
    }

    /// Cookie jar holding the session token and cached user.
    pub fn cookies_path() -> PathBuf {
        libradmin_home().join("cookies.json")
    }

    /// Key/value store standing in for browser local storage.
    pub fn local_storage_path() -> PathBuf {
        libradmin_home().join("local_storage.json")
    }

    pub fn logs_dir() -> PathBuf {
        libradmin_home().join("logs")
    }
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the library API
    pub api_url: String,
    /// Request timeout in seconds (0 = transport default)
    pub request_timeout_secs: u64,
    /// Log filter directive for the file log
    pub log_level: String,
}

impl Config {
    pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
    const DEFAULT_LOG_LEVEL: &str = "info";

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from `path`; a missing or blank file means
    /// defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read config from {}", path.display()));
            }
        };
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Resolves the API base URL with precedence: env > config > default.
    ///
    /// Trailing slashes are stripped so paths can be appended directly.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is not well-formed.
    pub fn resolve_api_url(&self) -> Result<String> {
        let env_url = std::env::var(API_URL_ENV).ok();
        let chosen = [env_url.as_deref(), Some(self.api_url.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(Self::DEFAULT_API_URL);

        url::Url::parse(chosen).with_context(|| format!("Invalid API base URL: {chosen}"))?;
        Ok(chosen.trim_end_matches('/').to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Uses the embedded template for structure/comments and merges
    /// generated values from `Config::default()` into it.
    ///
    /// # Errors
    /// Returns an error if the template or the generated values fail to parse.
    pub fn generate() -> Result<String> {
        use toml_edit::{DocumentMut, Item};

        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        for (key, value) in generated_doc.iter() {
            if let Item::Value(v) = value {
                doc[key] = Item::Value(v.clone());
            }
        }

        Ok(doc.to_string())
    }

    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        // Half-written config must never be picked up by `load`.
        let staged = path.with_extension("toml.tmp");
        fs::write(&staged, content)
            .with_context(|| format!("Failed to write config to {}", staged.display()))?;
        if let Err(err) = fs::rename(&staged, path) {
            let _ = fs::remove_file(&staged);
            return Err(err).with_context(|| format!("Failed to move config into {}", path.display()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Self::DEFAULT_API_URL.to_string(),
            request_timeout_secs: 0,
            log_level: Self::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "request_timeout_secs = 15\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.api_url, Config::DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_load_blank_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "\n  \n").unwrap();

        assert_eq!(Config::load_from(&config_path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "api_url = [").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_init_creates_config_and_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("subdir").join("config.toml");

        Config::init(&config_path).unwrap();
        let contents = fs::read_to_string(&config_path).unwrap();
        assert!(contents.contains("api_url ="));
        assert!(contents.contains("# Request timeout"));

        assert!(!config_path.with_extension("toml.tmp").exists());

        let err = Config::init(&config_path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let parsed: Config = toml::from_str(default_config_template()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_generate_keeps_comments() {
        let generated = Config::generate().unwrap();
        assert!(generated.contains("# Base URL of the library API"));
        let parsed: Config = toml::from_str(&generated).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_resolve_api_url_strips_trailing_slash() {
        let config = Config {
            api_url: "http://library.test/api/".into(),
            ..Config::default()
        };
        // Only meaningful when the override is unset in the test environment.
        if std::env::var(API_URL_ENV).is_err() {
            assert_eq!(config.resolve_api_url().unwrap(), "http://library.test/api");
        }
    }

    #[test]
    fn test_resolve_api_url_rejects_garbage() {
        let config = Config {
            api_url: "not a url".into(),
            ..Config::default()
        };
        if std::env::var(API_URL_ENV).is_err() {
            assert!(config.resolve_api_url().is_err());
        }
    }
}
