//! Application configuration for the knowledge pathway engine.
//!
//! User config lives at `~/.parentheses/parentheses.toml`.
//! Missing sections and fields fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ParenthesesError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "parentheses.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".parentheses";

// ---------------------------------------------------------------------------
// Config structs (matching parentheses.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Submission validation settings.
    #[serde(default)]
    pub validation: ValidationSection,

    /// Pathway graph tuning.
    #[serde(default)]
    pub pathway: PathwaySection,

    /// Exchange cycle and ledger settings.
    #[serde(default)]
    pub exchange: ExchangeSection,
}

/// `[validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSection {
    /// Minimum averaged content/size score a submission needs to pass.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// How long a positive validation result stays cached.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Upper bound on cached validation results.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Serialized content size at which the size score reaches zero.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            cache_ttl_secs: default_cache_ttl(),
            cache_max_entries: default_cache_max_entries(),
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

fn default_threshold() -> f64 {
    0.85
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_cache_max_entries() -> usize {
    10_000
}
fn default_max_content_bytes() -> usize {
    1024 * 1024
}

/// `[pathway]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwaySection {
    /// Similarity above which two items are linked.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Weight kept from the previous performance score when smoothing.
    #[serde(default = "default_smoothing_retention")]
    pub smoothing_retention: f64,

    /// Number of contributors rewarded per domain and cycle.
    #[serde(default = "default_top_contributors")]
    pub top_contributors: usize,
}

impl Default for PathwaySection {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            smoothing_retention: default_smoothing_retention(),
            top_contributors: default_top_contributors(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.7
}
fn default_smoothing_retention() -> f64 {
    0.7
}
fn default_top_contributors() -> usize {
    10
}

/// `[exchange]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSection {
    /// Seconds between background optimize/reward cycles.
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Seconds to wait after a cycle with optimization failures.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    /// Smallest ledger denomination per unit of contributor score.
    #[serde(default = "default_reward_unit")]
    pub reward_unit: u64,

    /// Upper bound on a single ledger call.
    #[serde(default = "default_ledger_timeout")]
    pub ledger_timeout_secs: u64,

    /// Maximum number of domain pathways.
    #[serde(default = "default_max_domains")]
    pub max_domains: usize,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            retry_backoff_secs: default_retry_backoff(),
            reward_unit: default_reward_unit(),
            ledger_timeout_secs: default_ledger_timeout(),
            max_domains: default_max_domains(),
        }
    }
}

fn default_cycle_interval() -> u64 {
    300
}
fn default_retry_backoff() -> u64 {
    60
}
fn default_reward_unit() -> u64 {
    1_000_000_000
}
fn default_ledger_timeout() -> u64 {
    30
}
fn default_max_domains() -> usize {
    100
}

impl AppConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let v = &self.validation;
        if !(0.0..=1.0).contains(&v.threshold) {
            return Err(ParenthesesError::config(format!(
                "validation.threshold must be within [0, 1], got {}",
                v.threshold
            )));
        }
        if v.max_content_bytes == 0 {
            return Err(ParenthesesError::config(
                "validation.max_content_bytes must be positive",
            ));
        }

        let p = &self.pathway;
        if !(0.0..=1.0).contains(&p.similarity_threshold) {
            return Err(ParenthesesError::config(format!(
                "pathway.similarity_threshold must be within [0, 1], got {}",
                p.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&p.smoothing_retention) {
            return Err(ParenthesesError::config(format!(
                "pathway.smoothing_retention must be within [0, 1], got {}",
                p.smoothing_retention
            )));
        }

        let e = &self.exchange;
        if e.cycle_interval_secs == 0 || e.retry_backoff_secs == 0 {
            return Err(ParenthesesError::config(
                "exchange cycle interval and retry backoff must be positive",
            ));
        }
        if e.ledger_timeout_secs == 0 {
            return Err(ParenthesesError::config(
                "exchange.ledger_timeout_secs must be positive",
            ));
        }
        if e.reward_unit == 0 {
            return Err(ParenthesesError::config(
                "exchange.reward_unit must be positive",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from AppConfig)
// ---------------------------------------------------------------------------

/// Runtime validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub threshold: f64,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub max_content_bytes: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ValidatorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            threshold: config.validation.threshold,
            cache_ttl: Duration::from_secs(config.validation.cache_ttl_secs),
            cache_max_entries: config.validation.cache_max_entries,
            max_content_bytes: config.validation.max_content_bytes,
        }
    }
}

/// Runtime pathway configuration.
#[derive(Debug, Clone)]
pub struct PathwayConfig {
    pub similarity_threshold: f64,
    pub smoothing_retention: f64,
    pub top_contributors: usize,
}

impl Default for PathwayConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PathwayConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            similarity_threshold: config.pathway.similarity_threshold,
            smoothing_retention: config.pathway.smoothing_retention,
            top_contributors: config.pathway.top_contributors,
        }
    }
}

/// Runtime exchange configuration, merged from the config file.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub validator: ValidatorConfig,
    pub pathway: PathwayConfig,
    pub cycle_interval: Duration,
    pub retry_backoff: Duration,
    pub reward_unit: u64,
    pub ledger_timeout: Duration,
    pub max_domains: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExchangeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            validator: ValidatorConfig::from(config),
            pathway: PathwayConfig::from(config),
            cycle_interval: Duration::from_secs(config.exchange.cycle_interval_secs),
            retry_backoff: Duration::from_secs(config.exchange.retry_backoff_secs),
            reward_unit: config.exchange.reward_unit,
            ledger_timeout: Duration::from_secs(config.exchange.ledger_timeout_secs),
            max_domains: config.exchange.max_domains,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.parentheses/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ParenthesesError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.parentheses/parentheses.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ParenthesesError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ParenthesesError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ParenthesesError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ParenthesesError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ParenthesesError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("threshold"));
        assert!(toml_str.contains("cycle_interval_secs"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.validation.threshold, 0.85);
        assert_eq!(parsed.exchange.reward_unit, 1_000_000_000);
        assert_eq!(parsed.pathway.top_contributors, 10);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[exchange]
cycle_interval_secs = 30
reward_unit = 1000000
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.exchange.cycle_interval_secs, 30);
        assert_eq!(config.exchange.reward_unit, 1_000_000);
        assert_eq!(config.exchange.retry_backoff_secs, 60);
        assert_eq!(config.validation.cache_ttl_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn exchange_config_from_app_config() {
        let app = AppConfig::default();
        let exchange = ExchangeConfig::from(&app);
        assert_eq!(exchange.cycle_interval, Duration::from_secs(300));
        assert_eq!(exchange.retry_backoff, Duration::from_secs(60));
        assert_eq!(exchange.ledger_timeout, Duration::from_secs(30));
        assert_eq!(exchange.validator.cache_ttl, Duration::from_secs(3600));
        assert_eq!(exchange.validator.max_content_bytes, 1024 * 1024);
        assert_eq!(exchange.pathway.similarity_threshold, 0.7);
        assert_eq!(exchange.max_domains, 100);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = AppConfig::default();
        config.validation.threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("validation.threshold"));

        let mut config = AppConfig::default();
        config.exchange.reward_unit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("parentheses-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[validation]\nthreshold = 0.5\n").unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.validation.threshold, 0.5);

        std::fs::write(&path, "[validation]\nthreshold = -1.0\n").unwrap();
        assert!(load_config_from(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
