use chrono::{DateTime, Utc};

use crate::error::AppError;

/// Open/high/low/close prices of a period that saw at least one trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Ohlc {
    /// Fold a sequence of trade prices (oldest first). `None` when there are no prices.
    pub fn from_prices<I>(prices: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut iter = prices.into_iter();
        let first = iter.next()?;
        let mut ohlc = Self {
            open: first,
            high: first,
            low: first,
            close: first,
        };
        for price in iter {
            ohlc.update(price);
        }
        Some(ohlc)
    }

    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Price-flip annotation of a candle. Both flags may be set at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceFlip {
    pub bullish: bool,
    pub bearish: bool,
}

/// One fixed-duration OHLCV record plus the indicator annotations derived for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    /// Period start, aligned to the configured granularity.
    pub time: DateTime<Utc>,
    /// `None` when no trade happened in the period.
    pub ohlc: Option<Ohlc>,
    pub volume: f64,
    /// `None` until the flip detector has classified this entry.
    pub flip: Option<PriceFlip>,
    pub td_buy_count: u8,
    pub td_sell_count: u8,
}

impl Candle {
    pub fn new(time: DateTime<Utc>, ohlc: Option<Ohlc>, volume: f64) -> Self {
        Self {
            time,
            ohlc,
            volume,
            flip: None,
            td_buy_count: 0,
            td_sell_count: 0,
        }
    }

    /// Build a candle from an exchange historic-rate row `(time, low, high, open, close, volume)`
    /// where `time` is in unix seconds.
    pub fn from_rate_row(row: (i64, f64, f64, f64, f64, f64)) -> Option<Self> {
        let (secs, low, high, open, close, volume) = row;
        let time = DateTime::<Utc>::from_timestamp(secs, 0)?;
        Some(Self::new(
            time,
            Some(Ohlc {
                open,
                high,
                low,
                close,
            }),
            volume,
        ))
    }

    pub fn has_data(&self) -> bool {
        self.ohlc.is_some()
    }

    pub fn close(&self) -> Option<f64> {
        self.ohlc.map(|o| o.close)
    }

    /// Close price for a comparison that cannot proceed without one.
    pub fn require_close(&self) -> Result<f64, AppError> {
        self.close().ok_or(AppError::NoDataInPeriod(self.time))
    }

    pub fn is_bullish_price_flip(&self) -> bool {
        self.flip.is_some_and(|f| f.bullish)
    }

    pub fn is_bearish_price_flip(&self) -> bool {
        self.flip.is_some_and(|f| f.bearish)
    }

    /// Drop every derived annotation so the next re-derivation starts clean.
    pub fn clear_annotations(&mut self) {
        self.flip = None;
        self.td_buy_count = 0;
        self.td_sell_count = 0;
    }
}
