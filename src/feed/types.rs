use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::tick::Tick;

pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Messages on the exchange feed, tagged by their `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Match(MatchEvent),
    /// Replay of the most recent trade sent right after subscribing.
    LastMatch(MatchEvent),
    Heartbeat(Heartbeat),
    Subscriptions,
    Error {
        message: String,
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct MatchEvent {
    pub trade_id: u64,
    pub product_id: String,
    #[serde(deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(deserialize_with = "string_to_f64")]
    pub size: f64,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub sequence: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Heartbeat {
    pub product_id: String,
    #[serde(default)]
    pub sequence: Option<u64>,
    pub time: DateTime<Utc>,
}

impl MatchEvent {
    pub fn to_tick(&self) -> Tick {
        Tick {
            price: self.price,
            size: self.size,
            time: self.time,
            trade_id: self.trade_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscribeRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub product_ids: Vec<&'a str>,
    pub channels: Vec<&'static str>,
}

impl<'a> SubscribeRequest<'a> {
    pub fn matches(product: &'a str) -> Self {
        Self {
            kind: "subscribe",
            product_ids: vec![product],
            channels: vec!["matches", "heartbeat"],
        }
    }
}

/// Turn one feed frame into a tick. Only `match` messages for `product` produce one; everything
/// else parses to `None`. A malformed frame is an error the caller logs and drops.
pub fn parse_feed_message(text: &str, product: &str) -> Result<Option<Tick>, serde_json::Error> {
    let msg: FeedMessage = serde_json::from_str(text)?;
    Ok(match msg {
        FeedMessage::Match(event) if event.product_id == product => Some(event.to_tick()),
        FeedMessage::Match(event) => {
            tracing::debug!(product = %event.product_id, "Match for another product ignored");
            None
        }
        FeedMessage::Heartbeat(hb) => {
            tracing::trace!(product = %hb.product_id, sequence = ?hb.sequence, "Heartbeat");
            None
        }
        FeedMessage::Error { message, reason } => {
            tracing::warn!(message = %message, reason = ?reason, "Feed reported an error");
            None
        }
        FeedMessage::LastMatch(_) | FeedMessage::Subscriptions | FeedMessage::Other => None,
    })
}
