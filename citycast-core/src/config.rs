use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{orchestrator::OverlapPolicy, state::DEFAULT_CITY};

/// Environment variable that overrides the stored OpenWeather key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Provider endpoint overrides, mostly for self-hosted proxies.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Endpoints {
    pub weather_url: Option<String>,
    pub geocoding_url: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_city = "Paris"
/// overlap = "latest-run-only"
///
/// [endpoints]
/// weather_url = "http://localhost:8080/onecall"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// OpenWeather "One Call" API key.
    pub api_key: Option<String>,

    /// City loaded at startup; "London" when unset.
    pub default_city: Option<String>,

    /// Replaces the bundled places dataset.
    pub places_file: Option<PathBuf>,

    pub overlap: OverlapPolicy,

    pub endpoints: Endpoints,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "citycast", "citycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    /// API key from the environment, else from the file.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env: Option<String>) -> Option<String> {
        env.filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn default_city(&self) -> String {
        self.default_city
            .clone()
            .unwrap_or_else(|| DEFAULT_CITY.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.default_city(), "London");
        assert_eq!(cfg.overlap, OverlapPolicy::LastWriteWins);
    }

    #[test]
    fn save_then_load_keeps_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("OPEN_KEY");
        cfg.default_city = Some("Paris".into());
        cfg.overlap = OverlapPolicy::LatestRunOnly;
        cfg.endpoints.weather_url = Some("http://localhost:9000/onecall".into());
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.default_city(), "Paris");
    }

    #[test]
    fn parses_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "overlap = \"latest-run-only\"\n").unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.overlap, OverlapPolicy::LatestRunOnly);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "overlap = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn environment_key_takes_precedence() {
        let mut cfg = Config::default();
        assert_eq!(cfg.api_key_with_env(None), None);

        cfg.set_api_key("FILE_KEY");
        assert_eq!(cfg.api_key_with_env(None).as_deref(), Some("FILE_KEY"));
        assert_eq!(
            cfg.api_key_with_env(Some("ENV_KEY".into())).as_deref(),
            Some("ENV_KEY")
        );
        assert_eq!(
            cfg.api_key_with_env(Some("  ".into())).as_deref(),
            Some("FILE_KEY")
        );
    }
}
