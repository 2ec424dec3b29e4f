use crate::alert::Alert;
use crate::model::candle::Candle;

#[derive(Debug, Clone)]
pub enum WsConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, delay_ms: u64 },
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    WsStatus(WsConnectionStatus),
    /// Newest-first window, truncated to the display length. `preview` marks a window whose
    /// head is the still-open period.
    WindowUpdated {
        window: Vec<Candle>,
        preview: bool,
    },
    Alert(Alert),
    LogMessage(String),
    Error(String),
}
