use anyhow::{Context, Result};

use crate::clock::Granularity;
use crate::error::AppError;
use crate::model::candle::Candle;

const USER_AGENT: &str = concat!("demark-monitor/", env!("CARGO_PKG_VERSION"));

/// One historic-rate row: `[time, low, high, open, close, volume]`, time in unix seconds.
pub type RateRow = (i64, f64, f64, f64, f64, f64);

pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build exchange HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/time", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .context("ping failed")?
            .error_for_status()
            .context("ping returned error status")?;
        Ok(())
    }

    /// Historic candles for `product`, newest first, as served by the exchange.
    pub async fn get_candles(&self, product: &str, granularity: Granularity) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/products/{}/candles?granularity={}",
            self.base_url,
            product,
            granularity.as_secs()
        );
        tracing::debug!(%url, "Fetching historic candles");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("get_candles HTTP failed")?;

        let status = resp.status();
        let body = resp.text().await.context("get_candles body read failed")?;
        if !status.is_success() {
            return Err(AppError::ExchangeApi {
                status: status.as_u16(),
                msg: compact_error_body(&body),
            }
            .into());
        }

        let candles = parse_candles_response(&body)?;
        tracing::info!(product, granularity = %granularity, count = candles.len(), "Historic candles fetched");
        Ok(candles)
    }
}

/// Parse the historic-rates body into newest-first candles. Rows with an unrepresentable time
/// are skipped.
pub fn parse_candles_response(body: &str) -> Result<Vec<Candle>, AppError> {
    let rows: Vec<RateRow> = serde_json::from_str(body)?;
    let mut candles: Vec<Candle> = rows.into_iter().filter_map(Candle::from_rate_row).collect();
    candles.sort_by(|a, b| b.time.cmp(&a.time));
    Ok(candles)
}

fn compact_error_body(body: &str) -> String {
    let normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.len() > 180 {
        let cut = (0..=180).rev().find(|&i| normalized.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &normalized[..cut])
    } else {
        normalized
    }
}
