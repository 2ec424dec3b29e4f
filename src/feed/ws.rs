use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;

use super::types::{parse_feed_message, SubscribeRequest};
use crate::error::AppError;
use crate::event::{AppEvent, WsConnectionStatus};
use crate::pipeline::PipelineInput;

/// Exponential backoff for reconnection.
pub struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60), 2.0)
    }
}

/// Trade feed for one product. Ticks go straight into the pipeline input channel.
#[derive(Debug, Clone)]
pub struct FeedClient {
    url: String,
    product: String,
}

impl FeedClient {
    pub fn new(ws_url: &str, product: &str) -> Self {
        Self {
            url: ws_url.to_string(),
            product: product.to_string(),
        }
    }

    /// Connect and run the WebSocket loop with automatic reconnection.
    /// Sends WsStatus events through `status_tx` and ticks through `input_tx`.
    pub async fn connect_and_run(
        &self,
        input_tx: mpsc::Sender<PipelineInput>,
        status_tx: mpsc::Sender<AppEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut backoff = ExponentialBackoff::default();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let mut connected = false;
            match self
                .connect_once(&input_tx, &status_tx, &mut shutdown, &mut connected)
                .await
            {
                Ok(()) => {
                    let _ = status_tx
                        .send(AppEvent::WsStatus(WsConnectionStatus::Disconnected))
                        .await;
                    break;
                }
                Err(e) => {
                    if connected {
                        backoff.reset();
                        attempt = 1;
                    }
                    tracing::warn!(product = %self.product, attempt, error = %e, "Feed disconnected");
                    let _ = status_tx
                        .send(AppEvent::WsStatus(WsConnectionStatus::Disconnected))
                        .await;
                    let _ = status_tx
                        .send(AppEvent::LogMessage(format!("WS error: {}", e)))
                        .await;

                    let delay = backoff.next_delay();
                    let _ = status_tx
                        .send(AppEvent::WsStatus(WsConnectionStatus::Reconnecting {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        }))
                        .await;

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            let _ = status_tx
                                .send(AppEvent::LogMessage("Shutdown during reconnect".to_string()))
                                .await;
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn connect_once(
        &self,
        input_tx: &mpsc::Sender<PipelineInput>,
        status_tx: &mpsc::Sender<AppEvent>,
        shutdown: &mut watch::Receiver<bool>,
        connected: &mut bool,
    ) -> Result<()> {
        let _ = status_tx
            .send(AppEvent::LogMessage(format!("Connecting to {}", self.url)))
            .await;

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("WebSocket connect failed")?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe = serde_json::to_string(&SubscribeRequest::matches(&self.product))?;
        write
            .send(tungstenite::Message::Text(subscribe))
            .await
            .context("subscribe send failed")?;

        *connected = true;
        let _ = status_tx
            .send(AppEvent::WsStatus(WsConnectionStatus::Connected))
            .await;
        let _ = status_tx
            .send(AppEvent::LogMessage(format!(
                "Subscribed to {} matches",
                self.product
            )))
            .await;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            match parse_feed_message(&text, &self.product) {
                                Ok(Some(tick)) => {
                                    if input_tx.try_send(PipelineInput::Tick(tick)).is_err() {
                                        tracing::warn!("Pipeline channel full, dropping tick");
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    tracing::warn!(error = %e, "Malformed feed message dropped");
                                }
                            }
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            return Err(AppError::WebSocket(format!("closed by server: {:?}", frame)).into());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(AppError::WebSocket(format!("read failed: {}", e)).into());
                        }
                        None => {
                            return Err(AppError::WebSocket("stream ended".to_string()).into());
                        }
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    return Ok(());
                }
            }
        }
    }
}
