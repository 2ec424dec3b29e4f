use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use demark_monitor::alert::{AlertEvaluator, AlertKind, AlertNotifier};
use demark_monitor::config::AlertConfig;
use demark_monitor::model::candle::{Candle, Ohlc};
use demark_monitor::pipeline::WindowSnapshot;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(secs)
}

fn window(close: f64, buy: u8, sell: u8, preview: bool) -> WindowSnapshot {
    let mut candle = Candle::new(
        t(0),
        Some(Ohlc {
            open: close,
            high: close,
            low: close,
            close,
        }),
        1.0,
    );
    candle.td_buy_count = buy;
    candle.td_sell_count = sell;
    WindowSnapshot {
        product: "BTC-USD".to_string(),
        window: vec![candle],
        preview,
    }
}

fn config() -> AlertConfig {
    AlertConfig {
        enabled: true,
        increasing: vec![110.0],
        decreasing: vec![90.0, 95.0],
        countdown_threshold: Some(9),
        cooldown_secs: 30,
        webhook_url: None,
    }
}

#[test]
/// Verifies price thresholds:
/// closes at or beyond a threshold fire, closes inside the band do not.
fn price_thresholds_fire_inclusively() {
    let mut eval = AlertEvaluator::new(&config());
    assert!(eval.evaluate(&window(100.0, 0, 0, true), t(0)).is_empty());

    let above = eval.evaluate(&window(110.0, 0, 0, true), t(1));
    assert_eq!(above.len(), 1);
    assert_eq!(above[0].kind, AlertKind::PriceAbove { threshold: 110.0 });

    let below = eval.evaluate(&window(90.0, 0, 0, true), t(2));
    let kinds: Vec<_> = below.iter().map(|a| a.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            AlertKind::PriceBelow { threshold: 90.0 },
            AlertKind::PriceBelow { threshold: 95.0 }
        ]
    );
}

#[test]
/// Verifies the cooldown:
/// the same alert is suppressed within the cooldown and fires again after it.
fn cooldown_suppresses_repeats() {
    let mut eval = AlertEvaluator::new(&config());
    assert_eq!(eval.evaluate(&window(120.0, 0, 0, true), t(0)).len(), 1);
    assert!(eval.evaluate(&window(121.0, 0, 0, true), t(29)).is_empty());
    assert_eq!(eval.evaluate(&window(122.0, 0, 0, true), t(30)).len(), 1);
}

#[test]
/// Verifies countdown alerts only consider committed windows and fire once per candle.
fn countdown_alert_fires_once_per_committed_candle() {
    let mut eval = AlertEvaluator::new(&AlertConfig {
        cooldown_secs: 0,
        ..config()
    });
    assert!(eval.evaluate(&window(100.0, 9, 0, true), t(0)).is_empty());

    let fired = eval.evaluate(&window(100.0, 9, 0, false), t(1));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, AlertKind::BuyCountdown { count: 9 });
    assert!(fired[0].message.contains("buy countdown"));

    assert!(eval.evaluate(&window(100.0, 9, 0, false), t(100)).is_empty());

    let sell = eval.evaluate(&window(100.0, 0, 9, false), t(101));
    assert_eq!(sell[0].kind, AlertKind::SellCountdown { count: 9 });
}

#[test]
/// Verifies the webhook payload shape carries the alert kind inline.
fn alert_serializes_with_flat_kind() {
    let mut eval = AlertEvaluator::new(&config());
    let alert = eval.evaluate(&window(111.0, 0, 0, true), t(0)).remove(0);
    let json = serde_json::to_value(&alert).unwrap();
    assert_eq!(json["kind"], "price_above");
    assert_eq!(json["threshold"], 110.0);
    assert_eq!(json["product"], "BTC-USD");
}

#[test]
/// Verifies log-only delivery succeeds without a webhook.
fn notifier_without_webhook_only_logs() {
    let mut eval = AlertEvaluator::new(&config());
    let alert = eval.evaluate(&window(80.0, 0, 0, true), t(0)).remove(0);
    let notifier = AlertNotifier::new(None);
    assert!(tokio_test::block_on(notifier.notify(&alert)).is_ok());
}
