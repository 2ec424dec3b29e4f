use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::config::AlertConfig;
use crate::error::AppError;
use crate::event::AppEvent;
use crate::pipeline::WindowSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    PriceAbove { threshold: f64 },
    PriceBelow { threshold: f64 },
    BuyCountdown { count: u8 },
    SellCountdown { count: u8 },
}

impl AlertKind {
    fn key(&self) -> String {
        match self {
            AlertKind::PriceAbove { threshold } => format!("above:{}", threshold),
            AlertKind::PriceBelow { threshold } => format!("below:{}", threshold),
            AlertKind::BuyCountdown { .. } => "buy_countdown".to_string(),
            AlertKind::SellCountdown { .. } => "sell_countdown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub product: String,
    #[serde(flatten)]
    pub kind: AlertKind,
    pub price: Option<f64>,
    pub candle_time: DateTime<Utc>,
    pub fired_at: DateTime<Utc>,
    pub message: String,
}

/// Threshold and countdown checks over published windows, with a per-key cooldown.
#[derive(Debug)]
pub struct AlertEvaluator {
    increasing: Vec<f64>,
    decreasing: Vec<f64>,
    countdown_threshold: Option<u8>,
    cooldown: TimeDelta,
    last_fired: HashMap<String, DateTime<Utc>>,
    countdown_candles: HashMap<String, DateTime<Utc>>,
}

impl AlertEvaluator {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            increasing: config.increasing.clone(),
            decreasing: config.decreasing.clone(),
            countdown_threshold: config.countdown_threshold,
            cooldown: TimeDelta::seconds(config.cooldown_secs as i64),
            last_fired: HashMap::new(),
            countdown_candles: HashMap::new(),
        }
    }

    pub fn evaluate(&mut self, snapshot: &WindowSnapshot, now: DateTime<Utc>) -> Vec<Alert> {
        let Some(newest) = snapshot.window.first() else {
            return Vec::new();
        };
        let mut candidates = Vec::new();

        if let Some(close) = newest.close() {
            for &threshold in &self.increasing {
                if close >= threshold {
                    candidates.push(AlertKind::PriceAbove { threshold });
                }
            }
            for &threshold in &self.decreasing {
                if close <= threshold {
                    candidates.push(AlertKind::PriceBelow { threshold });
                }
            }
        }

        if let (Some(threshold), false) = (self.countdown_threshold, snapshot.preview) {
            if newest.td_buy_count == threshold {
                candidates.push(AlertKind::BuyCountdown { count: threshold });
            }
            if newest.td_sell_count == threshold {
                candidates.push(AlertKind::SellCountdown { count: threshold });
            }
        }

        let mut fired = Vec::new();
        for kind in candidates {
            let key = kind.key();
            let is_countdown = matches!(
                kind,
                AlertKind::BuyCountdown { .. } | AlertKind::SellCountdown { .. }
            );
            if is_countdown && self.countdown_candles.get(&key) == Some(&newest.time) {
                continue;
            }
            if let Some(last) = self.last_fired.get(&key) {
                if now - *last < self.cooldown {
                    tracing::debug!(key = %key, "Alert suppressed by cooldown");
                    continue;
                }
            }
            self.last_fired.insert(key.clone(), now);
            if is_countdown {
                self.countdown_candles.insert(key, newest.time);
            }
            fired.push(Alert {
                product: snapshot.product.clone(),
                message: describe(&snapshot.product, &kind, newest.close()),
                kind,
                price: newest.close(),
                candle_time: newest.time,
                fired_at: now,
            });
        }
        fired
    }
}

fn describe(product: &str, kind: &AlertKind, price: Option<f64>) -> String {
    let price = price.map_or_else(|| "n/a".to_string(), |p| format!("{:.2}", p));
    match kind {
        AlertKind::PriceAbove { threshold } => {
            format!("{} rose to {} (threshold {})", product, price, threshold)
        }
        AlertKind::PriceBelow { threshold } => {
            format!("{} fell to {} (threshold {})", product, price, threshold)
        }
        AlertKind::BuyCountdown { count } => {
            format!("{} buy countdown reached {} at {}", product, count, price)
        }
        AlertKind::SellCountdown { count } => {
            format!("{} sell countdown reached {} at {}", product, count, price)
        }
    }
}

/// Delivers alerts to a webhook when one is configured, otherwise only logs them.
pub struct AlertNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl AlertNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub async fn notify(&self, alert: &Alert) -> Result<(), AppError> {
        tracing::info!(product = %alert.product, kind = ?alert.kind, "{}", alert.message);
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };
        self.http
            .post(url)
            .json(alert)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub async fn run_alert_loop(
    mut evaluator: AlertEvaluator,
    notifier: AlertNotifier,
    mut window_rx: mpsc::Receiver<WindowSnapshot>,
    app_tx: mpsc::Sender<AppEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            snapshot = window_rx.recv() => {
                let Some(snapshot) = snapshot else {
                    tracing::info!("Window channel closed, alert task exiting");
                    break;
                };
                for alert in evaluator.evaluate(&snapshot, Utc::now()) {
                    if let Err(e) = notifier.notify(&alert).await {
                        tracing::warn!(error = %e, "Alert delivery failed");
                        let _ = app_tx
                            .send(AppEvent::LogMessage(format!("Alert delivery failed: {}", e)))
                            .await;
                    }
                    let _ = app_tx.send(AppEvent::Alert(alert)).await;
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("Alert task shutting down");
                break;
            }
        }
    }
}
