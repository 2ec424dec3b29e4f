use serde::Deserialize;

use crate::error::AppError;
use crate::model::candle::{Candle, PriceFlip};

/// Oldest relative offset a flip classification reads (`market comparison` candle).
pub const FLIP_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipComparison {
    /// `<=` / `>=`
    #[default]
    Inclusive,
    /// `<` / `>`
    Strict,
}

impl FlipComparison {
    fn at_most(self, a: f64, b: f64) -> bool {
        match self {
            FlipComparison::Inclusive => a <= b,
            FlipComparison::Strict => a < b,
        }
    }

    fn at_least(self, a: f64, b: f64) -> bool {
        match self {
            FlipComparison::Inclusive => a >= b,
            FlipComparison::Strict => a > b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipKind {
    Bullish,
    Bearish,
}

/// Classify `history[index]` against its neighbours at offsets 1, 4 and 5 (newest-first).
pub fn classify(
    history: &[Candle],
    index: usize,
    comparison: FlipComparison,
) -> Result<PriceFlip, AppError> {
    if index + FLIP_LOOKBACK >= history.len() {
        return Err(AppError::IllegalState(format!(
            "flip classification at index {} needs {} older candles, history has {}",
            index,
            FLIP_LOOKBACK,
            history.len()
        )));
    }
    let current = history[index].require_close()?;
    let market = history[index + 1].require_close()?;
    let current_cmp = history[index + 4].require_close()?;
    let market_cmp = history[index + 5].require_close()?;

    Ok(PriceFlip {
        bearish: comparison.at_most(current, current_cmp)
            && comparison.at_least(market, market_cmp),
        bullish: comparison.at_least(current, current_cmp)
            && comparison.at_most(market, market_cmp),
    })
}

/// Annotate every entry that has the full lookback behind it. The oldest `FLIP_LOOKBACK`
/// entries come back with `flip = None`; the length never changes.
pub fn annotate_flips(history: &[Candle], comparison: FlipComparison) -> Vec<Candle> {
    let annotated_len = history.len().saturating_sub(FLIP_LOOKBACK);
    history
        .iter()
        .enumerate()
        .map(|(index, candle)| {
            let mut out = candle.clone();
            out.flip = if index < annotated_len {
                match classify(history, index, comparison) {
                    Ok(flip) => Some(flip),
                    Err(e) => {
                        tracing::debug!(index, time = %candle.time, error = %e, "No flip: missing price data");
                        Some(PriceFlip::default())
                    }
                }
            } else {
                None
            };
            out
        })
        .collect()
}

/// Newest-first prefix of `window` up to and including the most recent flip of `kind`.
/// The whole window is returned when no such flip exists.
pub fn candles_since_flip(window: &[Candle], kind: FlipKind) -> &[Candle] {
    let hit = window.iter().position(|c| match kind {
        FlipKind::Bullish => c.is_bullish_price_flip(),
        FlipKind::Bearish => c.is_bearish_price_flip(),
    });
    match hit {
        Some(index) => &window[..=index],
        None => window,
    }
}

/// Every entry that carries a flip classification, newest first. This is the combined
/// bullish/bearish view: the whole window minus the warm-up tail.
pub fn classified_window(window: &[Candle]) -> &[Candle] {
    &window[..window.len().saturating_sub(FLIP_LOOKBACK)]
}
