use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::paths::default_config_file_path;

pub const DEFAULT_PREFERRED_SOURCE: &str = "VidSrc.to";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Provider loaded first when a title opens, if it can serve the request.
    #[serde(default = "default_preferred_source")]
    pub preferred_source: String,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub library: LibraryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_source: default_preferred_source(),
            metadata: MetadataConfig::default(),
            probe: ProbeConfig::default(),
            player: PlayerConfig::default(),
            library: LibraryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    /// Base of the metadata proxy; `/omdb-proxy` and `/check-video` hang off it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_metadata_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_metadata_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_attempts")]
    pub attempts: usize,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_ms: default_metadata_connect_timeout_ms(),
            read_timeout_ms: default_metadata_read_timeout_ms(),
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl MetadataConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_probe_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_probe_connect_timeout_ms(),
            read_timeout_ms: default_probe_read_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Command that receives the playback URL. Empty means report-only.
    #[serde(default = "default_opener")]
    pub opener: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            opener: default_opener(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default = "default_continue_capacity")]
    pub continue_capacity: usize,

    #[serde(default = "default_watchlist_capacity")]
    pub watchlist_capacity: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            continue_capacity: default_continue_capacity(),
            watchlist_capacity: default_watchlist_capacity(),
        }
    }
}

fn default_preferred_source() -> String {
    DEFAULT_PREFERRED_SOURCE.to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_metadata_connect_timeout_ms() -> u64 {
    3_000
}

fn default_metadata_read_timeout_ms() -> u64 {
    6_000
}

fn default_attempts() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_probe_connect_timeout_ms() -> u64 {
    2_000
}

fn default_probe_read_timeout_ms() -> u64 {
    5_000
}

fn default_opener() -> String {
    if cfg!(target_os = "macos") {
        "open".to_string()
    } else if cfg!(target_os = "windows") {
        "explorer".to_string()
    } else {
        "xdg-open".to_string()
    }
}

fn default_continue_capacity() -> usize {
    20
}

fn default_watchlist_capacity() -> usize {
    100
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Loads the explicit file, else the default location if it exists, else defaults;
/// then applies environment overrides and validates.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    let mut config = match custom_path {
        Some(path) => load_config(path)?,
        None => match default_config_file_path() {
            Some(path) if path.exists() => load_config(&path)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |key| env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

pub(crate) fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(base) = lookup("REELPICK_API_BASE").filter(|v| !v.trim().is_empty()) {
        config.metadata.base_url = base.trim().to_string();
    }
    // An empty opener is meaningful (report-only), so it is not filtered.
    if let Some(opener) = lookup("REELPICK_OPENER") {
        config.player.opener = opener.trim().to_string();
    }
    if let Some(name) = lookup("REELPICK_PREFERRED_SOURCE").filter(|v| !v.trim().is_empty()) {
        config.preferred_source = name.trim().to_string();
    }
}

pub(crate) fn validate_config(config: &Config) -> Result<()> {
    if config.metadata.base_url.trim().is_empty() {
        bail!("metadata.base_url cannot be empty");
    }
    if config.library.continue_capacity == 0 {
        bail!("library.continue_capacity must be at least 1");
    }
    if config.library.watchlist_capacity == 0 {
        bail!("library.watchlist_capacity must be at least 1");
    }
    if config.metadata.attempts == 0 {
        bail!("metadata.attempts must be at least 1");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.preferred_source, "VidSrc.to");
        assert_eq!(config.library.continue_capacity, 20);
        assert_eq!(config.library.watchlist_capacity, 100);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let raw = r#"
            preferred_source = "MoviesAPI"

            [metadata]
            base_url = "https://proxy.example/api"

            [library]
            watchlist_capacity = 5
        "#;
        let config: Config = toml::from_str(raw).expect("config should parse");
        assert_eq!(config.preferred_source, "MoviesAPI");
        assert_eq!(config.metadata.base_url, "https://proxy.example/api");
        assert_eq!(config.metadata.attempts, 2);
        assert_eq!(config.library.watchlist_capacity, 5);
        assert_eq!(config.library.continue_capacity, 20);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| match key {
            "REELPICK_API_BASE" => Some(" http://10.0.0.2/api ".to_string()),
            "REELPICK_OPENER" => Some(String::new()),
            "REELPICK_PREFERRED_SOURCE" => Some("2Embed".to_string()),
            _ => None,
        });
        assert_eq!(config.metadata.base_url, "http://10.0.0.2/api");
        assert_eq!(config.player.opener, "");
        assert_eq!(config.preferred_source, "2Embed");
    }

    #[test]
    fn blank_env_values_do_not_clear_required_settings() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| match key {
            "REELPICK_API_BASE" | "REELPICK_PREFERRED_SOURCE" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.metadata.base_url, "http://127.0.0.1:3000/api");
        assert_eq!(config.preferred_source, "VidSrc.to");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.library.continue_capacity = 0;
        let err = validate_config(&config).expect_err("zero capacity must fail");
        assert!(err.to_string().contains("continue_capacity"));
    }

    #[test]
    fn load_config_reports_path_on_parse_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "preferred_source = [").expect("write config");
        let err = load_config(&path).expect_err("broken toml must fail");
        assert!(format!("{err:#}").contains("config.toml"));
    }
}
