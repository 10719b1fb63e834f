//! Configuration file handling for recon.
//!
//! The configuration file is stored at `$RECON_HOME/config.json` and tells the tool where the
//! registration backend lives and which event to reconcile by default.

use crate::error::{ErrorType, IntoResult, Res};
use crate::utils;
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "recon";
const CONFIG_VERSION: u8 = 1;
const TIMEOUT_SECS: u64 = 60;
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$RECON_HOME` and from there it loads `$RECON_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory and an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the home directory, e.g. `$HOME/recon`
    /// - `api_url` - The base URL of the registration backend, e.g. `https://admin.example.com/api`
    /// - `event_id` - The event to reconcile when a command does not name one.
    ///
    /// # Errors
    /// - Returns an error if `api_url` is not a usable base URL or if any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        api_url: &str,
        event_id: Option<String>,
    ) -> crate::Result<Self> {
        Self::create_inner(dir.into(), api_url, event_id)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(
        maybe_relative: PathBuf,
        api_url: &str,
        event_id: Option<String>,
    ) -> Res<Self> {
        validate_api_url(api_url)?;

        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the recon home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;
        let config_path = root.join(CONFIG_JSON);

        let config_file = ConfigFile {
            api_url: api_url.to_string(),
            event_id,
            ..Default::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `recon_home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(recon_home: impl Into<PathBuf>) -> crate::Result<Self> {
        Self::load_inner(recon_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Recon Home is missing, run 'recon init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        validate_api_url(&config_file.api_url)?;

        Ok(Self {
            root,
            config_path,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn api_url(&self) -> &str {
        &self.config_file.api_url
    }

    /// The default event id, if one was configured.
    pub fn event_id(&self) -> Option<&str> {
        self.config_file.event_id.as_deref()
    }

    /// Picks `explicit` when given, otherwise the configured default.
    pub fn resolve_event_id(&self, explicit: Option<&str>) -> Res<String> {
        match explicit.or(self.event_id()) {
            Some(id) if !id.trim().is_empty() => Ok(id.to_string()),
            _ => bail!(
                "No event id was given and no default is configured in '{}'",
                self.config_path.display()
            ),
        }
    }

    /// Timeout applied to every backend request.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.timeout_secs)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "recon",
///   "config_version": 1,
///   "api_url": "https://admin.example.com/api",
///   "event_id": "2024-seoul-spring",
///   "timeout_secs": 60
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "recon"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the registration backend
    api_url: String,

    /// Event to reconcile when a command does not specify one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event_id: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    TIMEOUT_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: String::new(),
            event_id: None,
            timeout_secs: TIMEOUT_SECS,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names a different app.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Unable to load the config file")?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {} in config file. Is a newer version of recon available?",
            config.config_version
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

/// The API URL must be an absolute http(s) URL that can have path segments appended.
fn validate_api_url(api_url: &str) -> Res<()> {
    let url = Url::parse(api_url).with_context(|| format!("Invalid API URL '{api_url}'"))?;
    ensure!(
        matches!(url.scheme(), "http" | "https"),
        "The API URL must use http or https, got '{api_url}'"
    );
    ensure!(
        !url.cannot_be_a_base(),
        "The API URL '{api_url}' cannot be a base"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("recon_home");
        let config = Config::create(
            &home_dir,
            "https://admin.example.com/api",
            Some("EV-2024".into()),
        )
        .await
        .unwrap();
        assert!(config.config_path().is_file());
        assert_eq!(config.api_url(), "https://admin.example.com/api");

        let loaded = Config::load(&home_dir).await.unwrap();
        assert_eq!(loaded.event_id(), Some("EV-2024"));
        assert_eq!(loaded.timeout(), Duration::from_secs(TIMEOUT_SECS));
        assert_eq!(loaded.root(), config.root());
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        let err = Config::create(dir.path(), "ftp://example.com", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("http or https"), "{err}");
        assert!(Config::create(dir.path(), "not a url", None).await.is_err());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert!(err.to_string().contains("recon init"), "{err}");
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "recon",
            "config_version": 1,
            "api_url": "http://localhost:8080"
        }"#;
        utils::write(dir.path().join(CONFIG_JSON), json).await.unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.event_id(), None);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "ledger",
            "config_version": 1,
            "api_url": "http://localhost:8080"
        }"#;
        utils::write(&path, json).await.unwrap();
        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_resolve_event_id() {
        let dir = TempDir::new().unwrap();
        let config = Config::create(dir.path(), "http://localhost:8080", None)
            .await
            .unwrap();
        assert!(config.resolve_event_id(None).is_err());
        assert_eq!(config.resolve_event_id(Some("EV-9")).unwrap(), "EV-9");

        let config = Config::create(dir.path(), "http://localhost:8080", Some("EV-1".into()))
            .await
            .unwrap();
        assert_eq!(config.resolve_event_id(None).unwrap(), "EV-1");
        assert_eq!(config.resolve_event_id(Some("EV-9")).unwrap(), "EV-9");
    }

    #[test]
    fn test_serialization_omits_missing_event() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("event_id"));
        assert!(json.contains("\"timeout_secs\":60"));
    }
}
