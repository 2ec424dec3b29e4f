use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::clock::{Granularity, TimerMode};
use crate::history::DEFAULT_HISTORY_LEN;
use crate::indicator::IndicatorSettings;
use crate::pipeline::DEFAULT_DISPLAY_LEN;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub candles: CandleConfig,
    #[serde(default)]
    pub indicator: IndicatorSettings,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub rest_base_url: String,
    pub ws_url: String,
    pub product: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandleConfig {
    pub granularity: String,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default)]
    pub timer_mode: TimerMode,
    #[serde(default)]
    pub preview_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    /// Fire when the newest close rises to or above any of these.
    pub increasing: Vec<f64>,
    /// Fire when the newest close falls to or below any of these.
    pub decreasing: Vec<f64>,
    /// Buy/sell count on the newest committed candle that raises a countdown alert.
    pub countdown_threshold: Option<u8>,
    pub cooldown_secs: u64,
    #[serde(skip)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub enabled: bool,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub refresh_rate_ms: u64,
    pub display_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: String,
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            increasing: Vec::new(),
            decreasing: Vec::new(),
            countdown_threshold: None,
            cooldown_secs: 30,
            webhook_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "data/demark.sqlite".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 100,
            display_len: DEFAULT_DISPLAY_LEN,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "demark-monitor.log".to_string(),
        }
    }
}

impl CandleConfig {
    pub fn granularity(&self) -> Result<Granularity> {
        self.granularity
            .parse()
            .with_context(|| format!("candles.granularity '{}' is invalid", self.granularity))
    }
}

impl Config {
    /// Read the config file (`DEMARK_CONFIG` or `config/default.toml`), then apply environment
    /// secrets from `.env` / the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("DEMARK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::from_path(&config_path)?;

        config.alerts.webhook_url = std::env::var("DEMARK_ALERT_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("invalid config toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.candles.granularity()?;
        if self.candles.history_len == 0 {
            bail!("candles.history_len must be > 0");
        }
        if self.ui.display_len == 0 {
            bail!("ui.display_len must be > 0");
        }
        if self.indicator.countdown_completion == 0 {
            bail!("indicator.countdown_completion must be > 0");
        }
        if self.feed.product.trim().is_empty() {
            bail!("feed.product must not be empty");
        }
        if let Some(threshold) = self.alerts.countdown_threshold {
            if threshold == 0 || threshold > self.indicator.countdown_completion {
                bail!(
                    "alerts.countdown_threshold must be within 1..={}",
                    self.indicator.countdown_completion
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::FlipComparison;

    const MINIMAL: &str = r#"
[feed]
rest_base_url = "https://api.exchange.coinbase.com"
ws_url = "wss://ws-feed.exchange.coinbase.com"
product = "BTC-USD"

[candles]
granularity = "5m"
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.candles.granularity().unwrap(), Granularity::FiveMinutes);
        assert_eq!(config.candles.history_len, 100);
        assert_eq!(config.candles.timer_mode, TimerMode::Reanchor);
        assert_eq!(config.indicator.flip_comparison, FlipComparison::Inclusive);
        assert_eq!(config.indicator.countdown_completion, 9);
        assert!(!config.indicator.recycle_after_completion);
        assert_eq!(config.ui.display_len, 30);
        assert_eq!(config.alerts.cooldown_secs, 30);
        assert_eq!(config.logging.file, "demark-monitor.log");
        assert!(!config.storage.enabled);
    }

    #[test]
    fn invalid_granularity_is_rejected() {
        let bad = MINIMAL.replace("\"5m\"", "\"2m\"");
        let err = Config::from_toml_str(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("2m"));
    }

    #[test]
    fn zero_history_len_is_rejected() {
        let bad = format!("{}history_len = 0\n", MINIMAL);
        assert!(Config::from_toml_str(&bad).is_err());
    }
}
