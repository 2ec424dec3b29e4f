pub mod dashboard;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use crate::event::{AppEvent, WsConnectionStatus};
use crate::input::UiCommand;
use crate::model::candle::Candle;

use dashboard::{CandleTable, KeybindBar, LogPanel, StatusBar};

const MAX_LOG_MESSAGES: usize = 200;
const MAX_ALERTS: usize = 50;

pub struct AppState {
    pub product: String,
    pub granularity: String,
    pub window: Vec<Candle>,
    pub preview: bool,
    pub ws_connected: bool,
    pub paused: bool,
    pub scroll: usize,
    pub window_updates: u64,
    pub alerts: Vec<String>,
    pub log_messages: Vec<String>,
}

impl AppState {
    pub fn new(product: &str, granularity: &str) -> Self {
        Self {
            product: product.to_string(),
            granularity: granularity.to_string(),
            window: Vec::new(),
            preview: false,
            ws_connected: false,
            paused: false,
            scroll: 0,
            window_updates: 0,
            alerts: Vec::new(),
            log_messages: Vec::new(),
        }
    }

    pub fn push_log(&mut self, msg: String) {
        self.log_messages.push(msg);
        if self.log_messages.len() > MAX_LOG_MESSAGES {
            self.log_messages.remove(0);
        }
    }

    fn push_alert(&mut self, msg: String) {
        self.alerts.push(msg);
        if self.alerts.len() > MAX_ALERTS {
            self.alerts.remove(0);
        }
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::WsStatus(status) => match status {
                WsConnectionStatus::Connected => {
                    self.ws_connected = true;
                }
                WsConnectionStatus::Disconnected => {
                    self.ws_connected = false;
                }
                WsConnectionStatus::Reconnecting { attempt, delay_ms } => {
                    self.ws_connected = false;
                    self.push_log(format!(
                        "Reconnecting (attempt {}, wait {}ms)",
                        attempt, delay_ms
                    ));
                }
            },
            AppEvent::WindowUpdated { window, preview } => {
                self.window_updates += 1;
                if !self.paused {
                    self.window = window;
                    self.preview = preview;
                    self.scroll = self.scroll.min(self.window.len().saturating_sub(1));
                }
            }
            AppEvent::Alert(alert) => {
                let line = format!("{} {}", alert.fired_at.format("%H:%M:%S"), alert.message);
                self.push_log(format!("[ALERT] {}", alert.message));
                self.push_alert(line);
            }
            AppEvent::LogMessage(msg) => {
                self.push_log(msg);
            }
            AppEvent::Error(msg) => {
                self.push_log(format!("[ERR] {}", msg));
            }
        }
    }

    pub fn handle_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Pause => {
                self.paused = true;
                self.push_log("Display paused".to_string());
            }
            UiCommand::Resume => {
                self.paused = false;
                self.push_log("Display resumed".to_string());
            }
            UiCommand::ScrollUp => {
                self.scroll = self.scroll.saturating_sub(1);
            }
            UiCommand::ScrollDown => {
                if self.scroll + 1 < self.window.len() {
                    self.scroll += 1;
                }
            }
        }
    }
}

pub fn render(frame: &mut Frame, state: &AppState) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(8),    // candle table
            Constraint::Length(6), // alerts + log
            Constraint::Length(1), // keybinds
        ])
        .split(frame.area());

    frame.render_widget(
        StatusBar {
            product: &state.product,
            granularity: &state.granularity,
            ws_connected: state.ws_connected,
            paused: state.paused,
            window_updates: state.window_updates,
        },
        outer[0],
    );

    frame.render_widget(
        CandleTable::new(&state.window, state.preview, state.scroll),
        outer[1],
    );

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(outer[2]);
    frame.render_widget(LogPanel::new("Alerts", &state.alerts), bottom[0]);
    frame.render_widget(LogPanel::new("Log", &state.log_messages), bottom[1]);

    frame.render_widget(KeybindBar, outer[3]);
}
