use demark_monitor::clock::{Granularity, TimerMode};
use demark_monitor::config::Config;
use demark_monitor::indicator::FlipComparison;

const FULL: &str = r#"
[feed]
rest_base_url = "https://api.exchange.coinbase.com"
ws_url = "wss://ws-feed.exchange.coinbase.com"
product = "ETH-USD"

[candles]
granularity = "15m"
history_len = 60
timer_mode = "fixed_period"
preview_interval_ms = 500

[indicator]
flip_comparison = "strict"
countdown_completion = 9
recycle_after_completion = true

[alerts]
enabled = true
increasing = [4000.0]
decreasing = [3000.0, 2500.0]
countdown_threshold = 9
cooldown_secs = 45

[storage]
enabled = true
path = "data/test.sqlite"

[ui]
refresh_rate_ms = 50
display_len = 20

[logging]
level = "debug"
file = "test.log"
"#;

#[test]
/// Verifies every section of a full config file is read.
fn full_config_parses() {
    let config = Config::from_toml_str(FULL).expect("config should parse");
    assert_eq!(config.feed.product, "ETH-USD");
    assert_eq!(config.candles.granularity().unwrap(), Granularity::FifteenMinutes);
    assert_eq!(config.candles.history_len, 60);
    assert_eq!(config.candles.timer_mode, TimerMode::FixedPeriod);
    assert_eq!(config.candles.preview_interval_ms, 500);
    assert_eq!(config.indicator.flip_comparison, FlipComparison::Strict);
    assert!(config.indicator.recycle_after_completion);
    assert_eq!(config.alerts.decreasing, vec![3000.0, 2500.0]);
    assert_eq!(config.alerts.countdown_threshold, Some(9));
    assert_eq!(config.alerts.cooldown_secs, 45);
    assert!(config.alerts.webhook_url.is_none());
    assert!(config.storage.enabled);
    assert_eq!(config.ui.display_len, 20);
    assert_eq!(config.logging.level, "debug");
}

#[test]
/// Verifies the shipped default config stays loadable.
fn shipped_default_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = Config::from_path(&path).expect("default config should load");
    assert_eq!(config.candles.granularity().unwrap(), Granularity::OneMinute);
    assert_eq!(config.candles.history_len, 100);
    assert_eq!(config.ui.display_len, 30);
}

#[test]
/// Verifies unknown enum values are refused at parse time.
fn unknown_timer_mode_is_rejected() {
    let bad = FULL.replace("\"fixed_period\"", "\"sometimes\"");
    assert!(Config::from_toml_str(&bad).is_err());
}

#[test]
/// Verifies validation of cross-field limits.
fn countdown_threshold_above_completion_is_rejected() {
    let bad = FULL.replace("countdown_threshold = 9", "countdown_threshold = 12");
    let err = Config::from_toml_str(&bad).unwrap_err();
    assert!(format!("{:#}", err).contains("countdown_threshold"));
}

#[test]
/// Verifies a missing feed section is an error rather than a silent default.
fn missing_feed_section_is_rejected() {
    let toml = "[candles]\ngranularity = \"1m\"\n";
    assert!(Config::from_toml_str(toml).is_err());
}
