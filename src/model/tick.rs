use chrono::{DateTime, Utc};

/// A single executed trade from the exchange feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub price: f64,
    pub size: f64,
    pub time: DateTime<Utc>,
    pub trade_id: u64,
}

impl Tick {
    pub fn new(price: f64, size: f64, time: DateTime<Utc>) -> Self {
        Self {
            price,
            size,
            time,
            trade_id: 0,
        }
    }
}
