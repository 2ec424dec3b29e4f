pub mod countdown;
pub mod flip;

use serde::Deserialize;

use crate::error::AppError;
use crate::model::candle::Candle;

pub use countdown::{annotate_counts, CountdownSettings};
pub use flip::{annotate_flips, candles_since_flip, classified_window, FlipComparison, FlipKind};

/// `[indicator]` section of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub flip_comparison: FlipComparison,
    pub countdown_completion: u8,
    pub recycle_after_completion: bool,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        let countdown = CountdownSettings::default();
        Self {
            flip_comparison: FlipComparison::default(),
            countdown_completion: countdown.completion,
            recycle_after_completion: countdown.recycle_after_completion,
        }
    }
}

impl IndicatorSettings {
    pub fn countdown(&self) -> CountdownSettings {
        CountdownSettings {
            completion: self.countdown_completion,
            recycle_after_completion: self.recycle_after_completion,
        }
    }
}

/// Re-derive every annotation of a newest-first history: flips first, then both countdowns.
pub fn derive(history: &[Candle], settings: &IndicatorSettings) -> Result<Vec<Candle>, AppError> {
    let flipped = annotate_flips(history, settings.flip_comparison);
    annotate_counts(&flipped, &settings.countdown())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeDelta, Utc};

    use crate::model::candle::{Candle, Ohlc};

    /// One-minute candles carrying only a close, newest first.
    pub fn candles_newest_first(closes: &[f64]) -> Vec<Candle> {
        let newest = DateTime::<Utc>::from_timestamp(1_700_000_000 - 1_700_000_000 % 60, 0)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Candle::new(
                    newest - TimeDelta::minutes(i as i64),
                    Some(Ohlc {
                        open: close,
                        high: close,
                        low: close,
                        close,
                    }),
                    1.0,
                )
            })
            .collect()
    }

    /// Same as [`candles_newest_first`] but written oldest first, the way the countdown reads.
    pub fn candles_oldest_first(closes: &[f64]) -> Vec<Candle> {
        let reversed: Vec<f64> = closes.iter().rev().copied().collect();
        candles_newest_first(&reversed)
    }
}
