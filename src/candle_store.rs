use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::model::candle::{Candle, Ohlc};
use crate::model::tick::Tick;

/// Work item for the store worker.
#[derive(Debug, Clone)]
pub enum StoreRecord {
    Candle { product: String, candle: Candle },
    Tick { product: String, tick: Tick },
}

pub struct CandleStore {
    conn: Connection,
}

impl CandleStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                product TEXT NOT NULL,
                time_ms INTEGER NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume REAL NOT NULL,
                bullish_flip INTEGER,
                bearish_flip INTEGER,
                td_buy_count INTEGER NOT NULL,
                td_sell_count INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                PRIMARY KEY(product, time_ms)
            );

            CREATE TABLE IF NOT EXISTS ticks (
                product TEXT NOT NULL,
                trade_id INTEGER NOT NULL,
                price REAL NOT NULL,
                size REAL NOT NULL,
                time_ms INTEGER NOT NULL,
                PRIMARY KEY(product, trade_id)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn upsert_candle(&self, product: &str, candle: &Candle) -> Result<(), AppError> {
        let ohlc = candle.ohlc;
        self.conn.execute(
            r#"
            INSERT INTO candles (
                product, time_ms, open, high, low, close, volume,
                bullish_flip, bearish_flip, td_buy_count, td_sell_count, updated_at_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(product, time_ms) DO UPDATE SET
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume,
                bullish_flip = excluded.bullish_flip,
                bearish_flip = excluded.bearish_flip,
                td_buy_count = excluded.td_buy_count,
                td_sell_count = excluded.td_sell_count,
                updated_at_ms = excluded.updated_at_ms
            "#,
            params![
                product,
                candle.time.timestamp_millis(),
                ohlc.map(|o| o.open),
                ohlc.map(|o| o.high),
                ohlc.map(|o| o.low),
                ohlc.map(|o| o.close),
                candle.volume,
                candle.flip.map(|f| f.bullish),
                candle.flip.map(|f| f.bearish),
                candle.td_buy_count,
                candle.td_sell_count,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Ticks are keyed by trade id; a replayed trade is ignored.
    pub fn insert_tick(&self, product: &str, tick: &Tick) -> Result<(), AppError> {
        self.conn.execute(
            r#"
            INSERT INTO ticks (product, trade_id, price, size, time_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(product, trade_id) DO NOTHING
            "#,
            params![
                product,
                tick.trade_id as i64,
                tick.price,
                tick.size,
                tick.time.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Up to `limit` stored candles, newest first, without annotations.
    pub fn recent_candles(&self, product: &str, limit: usize) -> Result<Vec<Candle>, AppError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT time_ms, open, high, low, close, volume
            FROM candles
            WHERE product = ?1
            ORDER BY time_ms DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![product, limit as i64], |row| {
            let time_ms: i64 = row.get(0)?;
            let open: Option<f64> = row.get(1)?;
            let high: Option<f64> = row.get(2)?;
            let low: Option<f64> = row.get(3)?;
            let close: Option<f64> = row.get(4)?;
            let volume: f64 = row.get(5)?;
            Ok((time_ms, open, high, low, close, volume))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (time_ms, open, high, low, close, volume) = row?;
            let Some(time) = DateTime::<Utc>::from_timestamp_millis(time_ms) else {
                tracing::warn!(time_ms, "Stored candle has an invalid timestamp, skipped");
                continue;
            };
            let ohlc = match (open, high, low, close) {
                (Some(open), Some(high), Some(low), Some(close)) => Some(Ohlc {
                    open,
                    high,
                    low,
                    close,
                }),
                _ => None,
            };
            out.push(Candle::new(time, ohlc, volume));
        }
        Ok(out)
    }

    pub fn tick_count(&self, product: &str) -> Result<usize, AppError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ticks WHERE product = ?1",
            params![product],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn apply(&self, record: &StoreRecord) -> Result<(), AppError> {
        match record {
            StoreRecord::Candle { product, candle } => self.upsert_candle(product, candle),
            StoreRecord::Tick { product, tick } => self.insert_tick(product, tick),
        }
    }
}

/// Own the store on a blocking thread and apply records until every sender is gone.
pub fn spawn_store_worker(store: CandleStore, mut rx: mpsc::Receiver<StoreRecord>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut written: u64 = 0;
        while let Some(record) = rx.blocking_recv() {
            match store.apply(&record) {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(error = %e, "Failed to persist record"),
            }
        }
        tracing::info!(written, "Store worker finished");
    })
}
