use chrono::{DateTime, Utc};

use crate::model::candle::{Candle, Ohlc};
use crate::model::tick::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// The period is the one already at the head of history.
    Merged,
    /// A new period started; only the ticks contribute.
    Fresh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedCandle {
    pub candle: Candle,
    pub mode: MergeMode,
}

/// Fold the ticks seen since `boundary` into the candle for that period.
///
/// When `latest` starts exactly at `boundary` the ticks extend it (open kept, extremes widened,
/// close moved to the last tick, volume added). Any other timestamp, or no history at all,
/// starts a fresh candle from the ticks alone; with no ticks that candle carries no prices.
pub fn merge_candle(boundary: DateTime<Utc>, latest: Option<&Candle>, ticks: &[Tick]) -> MergedCandle {
    let volume: f64 = ticks.iter().map(|t| t.size).sum();
    let from_ticks = Ohlc::from_prices(ticks.iter().map(|t| t.price));

    match latest {
        Some(head) if head.time == boundary => {
            let ohlc = match (head.ohlc, from_ticks) {
                (Some(prev), Some(new)) => Some(Ohlc {
                    open: prev.open,
                    high: prev.high.max(new.high),
                    low: prev.low.min(new.low),
                    close: new.close,
                }),
                (prev, new) => prev.or(new),
            };
            MergedCandle {
                candle: Candle::new(boundary, ohlc, head.volume + volume),
                mode: MergeMode::Merged,
            }
        }
        _ => MergedCandle {
            candle: Candle::new(boundary, from_ticks, volume),
            mode: MergeMode::Fresh,
        },
    }
}
