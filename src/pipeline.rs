use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::candle_store::StoreRecord;
use crate::clock::boundary_of;
use crate::error::AppError;
use crate::event::AppEvent;
use crate::history::HistoryManager;
use crate::model::candle::Candle;
use crate::model::tick::Tick;

pub const DEFAULT_DISPLAY_LEN: usize = 30;

/// Everything that mutates the history. One channel keeps them strictly ordered.
#[derive(Debug, Clone)]
pub enum PipelineInput {
    Tick(Tick),
    /// The period starting at this instant has closed.
    BoundaryClosed(DateTime<Utc>),
    Backfill(Vec<Candle>),
}

/// Window handed to the alert task.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub product: String,
    pub window: Vec<Candle>,
    pub preview: bool,
}

pub struct Pipeline {
    manager: HistoryManager,
    product: String,
    display_len: usize,
    preview_interval: Duration,
    last_preview: Option<Instant>,
    open_period: Option<DateTime<Utc>>,
    app_tx: mpsc::Sender<AppEvent>,
    alert_tx: Option<mpsc::Sender<WindowSnapshot>>,
    store_tx: Option<mpsc::Sender<StoreRecord>>,
}

impl Pipeline {
    pub fn new(manager: HistoryManager, product: &str, app_tx: mpsc::Sender<AppEvent>) -> Self {
        Self {
            manager,
            product: product.to_string(),
            display_len: DEFAULT_DISPLAY_LEN,
            preview_interval: Duration::ZERO,
            last_preview: None,
            open_period: None,
            app_tx,
            alert_tx: None,
            store_tx: None,
        }
    }

    pub fn with_display_len(mut self, display_len: usize) -> Self {
        self.display_len = display_len;
        self
    }

    /// Minimum spacing between two preview windows. Zero previews on every tick.
    pub fn with_preview_interval(mut self, interval: Duration) -> Self {
        self.preview_interval = interval;
        self
    }

    pub fn with_alerts(mut self, alert_tx: mpsc::Sender<WindowSnapshot>) -> Self {
        self.alert_tx = Some(alert_tx);
        self
    }

    pub fn with_store(mut self, store_tx: mpsc::Sender<StoreRecord>) -> Self {
        self.store_tx = Some(store_tx);
        self
    }

    pub fn manager(&self) -> &HistoryManager {
        &self.manager
    }

    /// Drain inputs until the channel closes or shutdown is signalled. Hands the history back.
    pub async fn run(
        mut self,
        mut input_rx: mpsc::Receiver<PipelineInput>,
        mut shutdown: watch::Receiver<bool>,
    ) -> HistoryManager {
        tracing::info!(
            product = %self.product,
            granularity = %self.manager.granularity(),
            bound = self.manager.bound(),
            "Pipeline started"
        );
        loop {
            tokio::select! {
                input = input_rx.recv() => {
                    match input {
                        Some(input) => self.process(input).await,
                        None => {
                            tracing::info!("Input channel closed, pipeline exiting");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Pipeline shutting down");
                    break;
                }
            }
        }
        self.manager
    }

    /// Apply one input. Failures are logged and reported; the history stays as it was.
    pub async fn process(&mut self, input: PipelineInput) {
        let label = match &input {
            PipelineInput::Tick(_) => "tick",
            PipelineInput::BoundaryClosed(_) => "boundary",
            PipelineInput::Backfill(_) => "backfill",
        };
        let result = match input {
            PipelineInput::Tick(tick) => self.handle_tick(tick).await,
            PipelineInput::BoundaryClosed(boundary) => self.handle_boundary(boundary).await,
            PipelineInput::Backfill(candles) => self.handle_backfill(candles).await,
        };
        if let Err(e) = result {
            tracing::error!(input = label, error = %e, "Pipeline event failed");
            let _ = self
                .app_tx
                .send(AppEvent::Error(format!("{} failed: {}", label, e)))
                .await;
        }
    }

    async fn handle_tick(&mut self, tick: Tick) -> Result<(), AppError> {
        let granularity = self.manager.granularity();
        let open = *self
            .open_period
            .get_or_insert_with(|| boundary_of(granularity, tick.time));
        self.persist(StoreRecord::Tick {
            product: self.product.clone(),
            tick: tick.clone(),
        });
        self.manager.on_tick(tick);

        let now = Instant::now();
        let due = self
            .last_preview
            .map_or(true, |last| now.duration_since(last) >= self.preview_interval);
        if !due {
            return Ok(());
        }
        let preview = self.manager.preview(open)?;
        self.last_preview = Some(now);
        self.publish(&preview, true).await;
        Ok(())
    }

    async fn handle_boundary(&mut self, boundary: DateTime<Utc>) -> Result<(), AppError> {
        let window = self.manager.on_boundary_closed(boundary)?.to_vec();
        self.open_period = Some(boundary + self.manager.granularity().time_delta());
        self.last_preview = None;
        if let Some(closed) = window.first() {
            tracing::info!(
                boundary = %boundary,
                close = ?closed.close(),
                buy = closed.td_buy_count,
                sell = closed.td_sell_count,
                "Candle closed"
            );
            self.persist(StoreRecord::Candle {
                product: self.product.clone(),
                candle: closed.clone(),
            });
        }
        self.publish(&window, false).await;
        Ok(())
    }

    async fn handle_backfill(&mut self, candles: Vec<Candle>) -> Result<(), AppError> {
        let window = self.manager.seed(candles)?.to_vec();
        self.publish(&window, false).await;
        Ok(())
    }

    fn persist(&self, record: StoreRecord) {
        if let Some(tx) = &self.store_tx {
            if tx.try_send(record).is_err() {
                tracing::warn!("Store channel full or closed, record dropped");
            }
        }
    }

    async fn publish(&self, window: &[Candle], preview: bool) {
        let shown: Vec<Candle> = window.iter().take(self.display_len).cloned().collect();
        if let Some(tx) = &self.alert_tx {
            let snapshot = WindowSnapshot {
                product: self.product.clone(),
                window: shown.clone(),
                preview,
            };
            if tx.try_send(snapshot).is_err() {
                tracing::warn!("Alert channel full or closed, window skipped");
            }
        }
        let _ = self
            .app_tx
            .send(AppEvent::WindowUpdated {
                window: shown,
                preview,
            })
            .await;
    }
}
