use crate::error::AppError;
use crate::indicator::flip::FLIP_LOOKBACK;
use crate::model::candle::{Candle, PriceFlip};

/// Offset of the candle each close is compared against (four periods earlier).
const COMPARE_OFFSET: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSettings {
    /// Count value at which a setup is complete.
    pub completion: u8,
    /// Keep counting after completion instead of waiting for a new starting flip.
    pub recycle_after_completion: bool,
}

impl Default for CountdownSettings {
    fn default() -> Self {
        Self {
            completion: 9,
            recycle_after_completion: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Buy,
    Sell,
}

impl Side {
    fn starts(self, flip: PriceFlip) -> bool {
        match self {
            Side::Buy => flip.bearish,
            Side::Sell => flip.bullish,
        }
    }

    fn cancels(self, flip: PriceFlip) -> bool {
        match self {
            Side::Buy => flip.bullish,
            Side::Sell => flip.bearish,
        }
    }

    fn qualifies(self, close: Option<f64>, compare: Option<f64>) -> bool {
        match (self, close, compare) {
            (Side::Buy, Some(c), Some(p)) => c < p,
            (Side::Sell, Some(c), Some(p)) => c > p,
            _ => false,
        }
    }

    fn slot(self, candle: &mut Candle) -> &mut u8 {
        match self {
            Side::Buy => &mut candle.td_buy_count,
            Side::Sell => &mut candle.td_sell_count,
        }
    }
}

/// Assign TD buy and sell counts to a flip-annotated, newest-first history.
///
/// Both passes walk from the oldest countable entry to the newest. Entries without the full
/// lookback behind them are warm-up and get zero. A countable entry with no flip annotation
/// means the flip pass was skipped and is rejected.
pub fn annotate_counts(history: &[Candle], settings: &CountdownSettings) -> Result<Vec<Candle>, AppError> {
    let mut out: Vec<Candle> = history
        .iter()
        .cloned()
        .map(|mut c| {
            c.td_buy_count = 0;
            c.td_sell_count = 0;
            c
        })
        .collect();
    let countable = history.len().saturating_sub(FLIP_LOOKBACK);

    for side in [Side::Buy, Side::Sell] {
        let mut active = false;
        let mut count: u8 = 0;

        for i in (0..countable).rev() {
            let flip = history[i].flip.ok_or_else(|| {
                AppError::IllegalState(format!(
                    "countdown reached candle {} before the flip pass annotated it",
                    history[i].time
                ))
            })?;

            if side.starts(flip) {
                active = true;
                count = 0;
            }
            if side.cancels(flip) {
                active = false;
                count = 0;
                continue;
            }
            if count >= settings.completion {
                count = 0;
                if !settings.recycle_after_completion {
                    active = false;
                }
            }

            let compare = history[i + COMPARE_OFFSET].close();
            if active && side.qualifies(history[i].close(), compare) {
                count += 1;
                *side.slot(&mut out[i]) = count;
            }
        }
    }

    Ok(out)
}
