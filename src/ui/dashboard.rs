use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

use crate::model::candle::Candle;

pub struct StatusBar<'a> {
    pub product: &'a str,
    pub granularity: &'a str,
    pub ws_connected: bool,
    pub paused: bool,
    pub window_updates: u64,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let conn_status = if self.ws_connected {
            Span::styled("CONNECTED", Style::default().fg(Color::Green))
        } else {
            Span::styled("DISCONNECTED", Style::default().fg(Color::Red))
        };

        let pause_status = if self.paused {
            Span::styled(" PAUSED ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(" LIVE ", Style::default().fg(Color::Green))
        };

        let line = Line::from(vec![
            Span::styled(
                " demark-monitor ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("| ", Style::default().fg(Color::DarkGray)),
            Span::styled(self.product, Style::default().fg(Color::Cyan)),
            Span::styled(" ", Style::default()),
            Span::styled(self.granularity, Style::default().fg(Color::Cyan)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            conn_status,
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            pause_status,
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("updates: {}", self.window_updates),
                Style::default().fg(Color::DarkGray),
            ),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

/// Newest-first candle rows with their flip markers and countdown values.
pub struct CandleTable<'a> {
    window: &'a [Candle],
    preview: bool,
    scroll: usize,
}

impl<'a> CandleTable<'a> {
    pub fn new(window: &'a [Candle], preview: bool, scroll: usize) -> Self {
        Self {
            window,
            preview,
            scroll,
        }
    }
}

pub fn flip_label(candle: &Candle) -> &'static str {
    match candle.flip {
        None => "..",
        Some(f) if f.bullish && f.bearish => "BOTH",
        Some(f) if f.bullish => "BULL",
        Some(f) if f.bearish => "BEAR",
        Some(_) => "",
    }
}

fn count_cell(count: u8, color: Color) -> Cell<'static> {
    if count == 0 {
        Cell::from("")
    } else {
        let style = if count >= 9 {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        };
        Cell::from(count.to_string()).style(style)
    }
}

fn price(value: Option<f64>) -> String {
    value.map_or_else(|| "---".to_string(), |v| format!("{:.2}", v))
}

impl Widget for CandleTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let header = Row::new(vec![
            "Time", "Open", "High", "Low", "Close", "Volume", "Flip", "Buy", "Sell",
        ])
        .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = self
            .window
            .iter()
            .enumerate()
            .skip(self.scroll)
            .map(|(i, c)| {
                let is_preview = self.preview && i == 0;
                let time = c.time.format("%m-%d %H:%M").to_string();
                let time = if is_preview { format!("*{}", time) } else { time };
                let close_color = match c.ohlc {
                    Some(o) if o.is_bullish() => Color::Green,
                    Some(_) => Color::Red,
                    None => Color::DarkGray,
                };
                let flip_color = match flip_label(c) {
                    "BULL" => Color::Green,
                    "BEAR" => Color::Red,
                    "BOTH" => Color::Magenta,
                    _ => Color::DarkGray,
                };
                let row = Row::new(vec![
                    Cell::from(time),
                    Cell::from(price(c.ohlc.map(|o| o.open))),
                    Cell::from(price(c.ohlc.map(|o| o.high))),
                    Cell::from(price(c.ohlc.map(|o| o.low))),
                    Cell::from(price(c.close())).style(Style::default().fg(close_color)),
                    Cell::from(format!("{:.4}", c.volume)),
                    Cell::from(flip_label(c)).style(Style::default().fg(flip_color)),
                    count_cell(c.td_buy_count, Color::Green),
                    count_cell(c.td_sell_count, Color::Red),
                ]);
                if is_preview {
                    row.style(Style::default().add_modifier(Modifier::ITALIC))
                } else {
                    row
                }
            })
            .collect();

        let widths = [
            Constraint::Length(13),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(12),
            Constraint::Length(5),
            Constraint::Length(4),
            Constraint::Length(4),
        ];

        let title = if self.preview {
            " Candles (* in progress) "
        } else {
            " Candles "
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Widget::render(Table::new(rows, widths).header(header).block(block), area, buf);
    }
}

pub struct LogPanel<'a> {
    title: &'a str,
    messages: &'a [String],
}

impl<'a> LogPanel<'a> {
    pub fn new(title: &'a str, messages: &'a [String]) -> Self {
        Self { title, messages }
    }
}

impl Widget for LogPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let visible = area.height.saturating_sub(2) as usize;
        let start = self.messages.len().saturating_sub(visible);
        let lines: Vec<Line> = self.messages[start..]
            .iter()
            .map(|m| {
                let color = if m.starts_with("[ERR]") {
                    Color::Red
                } else if m.starts_with("[ALERT]") {
                    Color::Yellow
                } else {
                    Color::Gray
                };
                Line::from(Span::styled(m.as_str(), Style::default().fg(color)))
            })
            .collect();

        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        Paragraph::new(lines).block(block).render(area, buf);
    }
}

pub struct KeybindBar;

impl Widget for KeybindBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = Line::from(vec![
            Span::styled(" [Q]", Style::default().fg(Color::Yellow)),
            Span::styled("uit  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[P]", Style::default().fg(Color::Yellow)),
            Span::styled("ause  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[R]", Style::default().fg(Color::Yellow)),
            Span::styled("esume  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[J/K]", Style::default().fg(Color::Yellow)),
            Span::styled(" scroll  ", Style::default().fg(Color::DarkGray)),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}
