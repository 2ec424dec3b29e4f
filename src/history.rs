use chrono::{DateTime, Utc};

use crate::candle_merge::{merge_candle, MergeMode};
use crate::clock::{is_aligned, Granularity};
use crate::error::AppError;
use crate::indicator::{self, IndicatorSettings};
use crate::model::candle::Candle;
use crate::model::tick::Tick;

pub const DEFAULT_HISTORY_LEN: usize = 100;

/// Bounded newest-first candle history plus the ticks of the period still open.
///
/// Every mutation computes the new window on a copy and swaps it in only once flips and counts
/// were re-derived without error, so a failed event leaves both history and buffer untouched.
#[derive(Debug)]
pub struct HistoryManager {
    granularity: Granularity,
    bound: usize,
    settings: IndicatorSettings,
    history: Vec<Candle>,
    buffer: Vec<Tick>,
}

impl HistoryManager {
    pub fn new(granularity: Granularity, bound: usize, settings: IndicatorSettings) -> Self {
        assert!(bound > 0, "history bound must be positive");
        Self {
            granularity,
            bound,
            settings,
            history: Vec::with_capacity(bound + 1),
            buffer: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.buffer.clear();
    }

    pub fn on_tick(&mut self, tick: Tick) {
        self.buffer.push(tick);
    }

    /// Fold the buffered ticks into the period starting at `boundary` and commit it.
    pub fn on_boundary_closed(&mut self, boundary: DateTime<Utc>) -> Result<&[Candle], AppError> {
        let (next, mode) = self.splice(boundary)?;
        tracing::debug!(
            boundary = %boundary,
            mode = ?mode,
            ticks = self.buffer.len(),
            len = next.len(),
            "Candle committed"
        );
        self.history = next;
        self.buffer.clear();
        Ok(&self.history)
    }

    /// Window as it would look if `boundary`'s period closed now. Nothing is committed.
    pub fn preview(&self, boundary: DateTime<Utc>) -> Result<Vec<Candle>, AppError> {
        self.splice(boundary).map(|(next, _)| next)
    }

    /// Merge historical candles into history. Entries already present keep precedence.
    pub fn seed(&mut self, candles: Vec<Candle>) -> Result<&[Candle], AppError> {
        if let Some(bad) = candles.iter().find(|c| !is_aligned(self.granularity, c.time)) {
            return Err(AppError::IllegalState(format!(
                "seed candle at {} is not aligned to {}",
                bad.time, self.granularity
            )));
        }

        let seeded = candles.len();
        let mut merged = self.history.clone();
        for mut candle in candles {
            if merged.iter().any(|c| c.time == candle.time) {
                continue;
            }
            candle.clear_annotations();
            merged.push(candle);
        }
        merged.sort_by(|a, b| b.time.cmp(&a.time));
        merged.dedup_by(|a, b| a.time == b.time);
        merged.truncate(self.bound);

        let next = indicator::derive(&merged, &self.settings)?;
        tracing::info!(seeded, len = next.len(), "History seeded");
        self.history = next;
        Ok(&self.history)
    }

    pub fn current_window(&self) -> &[Candle] {
        &self.history
    }

    pub fn pending_ticks(&self) -> &[Tick] {
        &self.buffer
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    fn splice(&self, boundary: DateTime<Utc>) -> Result<(Vec<Candle>, MergeMode), AppError> {
        if !is_aligned(self.granularity, boundary) {
            return Err(AppError::IllegalState(format!(
                "boundary {} is not aligned to {}",
                boundary, self.granularity
            )));
        }
        let head = self.history.first();
        if let Some(head) = head {
            if boundary < head.time {
                return Err(AppError::IllegalState(format!(
                    "boundary {} is older than newest candle {}",
                    boundary, head.time
                )));
            }
        }

        let merged = merge_candle(boundary, head, &self.buffer);
        let mut next = Vec::with_capacity(self.history.len() + 1);
        next.push(merged.candle);
        let skip = match merged.mode {
            MergeMode::Merged => 1,
            MergeMode::Fresh => 0,
        };
        next.extend(self.history.iter().skip(skip).cloned());
        next.truncate(self.bound);

        let next = indicator::derive(&next, &self.settings)?;
        Ok((next, merged.mode))
    }
}
