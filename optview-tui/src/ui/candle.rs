//! Candlestick widget drawn straight into the buffer.
//!
//! - Each candle = 1 terminal column, newest candles kept when space runs out
//! - Body: block char, up candles in the positive color, down in the negative
//! - Wicks: vertical line chars to high/low
//! - Bottom row: first and last date shown

use chrono::NaiveDate;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Widget},
};

use optview_core::domain::{OptionEod, StockBar};

use crate::theme::Theme;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

pub fn candles_from_bars(bars: &[StockBar]) -> Vec<Candle> {
    bars.iter()
        .map(|b| Candle {
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
        })
        .collect()
}

pub fn candles_from_eod(rows: &[OptionEod]) -> Vec<Candle> {
    rows.iter()
        .map(|r| Candle {
            date: r.date,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
        })
        .collect()
}

pub struct CandleChart<'a> {
    candles: &'a [Candle],
    title: &'a str,
    theme: &'a Theme,
}

impl<'a> CandleChart<'a> {
    pub fn new(candles: &'a [Candle], title: &'a str, theme: &'a Theme) -> Self {
        Self {
            candles,
            title,
            theme,
        }
    }
}

/// Map a price to a row in the plot area (0 = top).
fn price_to_y(price: f64, y_min: f64, y_max: f64, plot_height: u16) -> u16 {
    if (y_max - y_min).abs() < 1e-9 || plot_height == 0 {
        return 0;
    }
    let frac = (price - y_min) / (y_max - y_min);
    let y = plot_height.saturating_sub(1) as f64 * (1.0 - frac);
    y.round().clamp(0.0, plot_height.saturating_sub(1) as f64) as u16
}

impl Widget for CandleChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.candles.is_empty() {
            Block::default()
                .title(format!(" {} [No Data] ", self.title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.muted))
                .render(area, buf);
            return;
        }

        let y_min = self.candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let y_max = self
            .candles
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let range = y_max - y_min;
        let pad = if range > 0.0 { range * 0.05 } else { 1.0 };
        let y_lower = y_min - pad;
        let y_upper = y_max + pad;

        let up_count = self.candles.iter().filter(|c| c.close >= c.open).count();
        let down_count = self.candles.len() - up_count;

        let block = Block::default()
            .title(format!(
                " {} | {} up {} down ",
                self.title, up_count, down_count
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.muted));
        let inner = block.inner(area);
        block.render(area, buf);

        // 8 columns of price labels on the left, 1 row of dates at the bottom
        let label_width: u16 = 8;
        let plot_left = inner.x + label_width;
        let plot_top = inner.y;
        let plot_width = inner.width.saturating_sub(label_width);
        let plot_height = inner.height.saturating_sub(1);
        if plot_width == 0 || plot_height == 0 {
            return;
        }

        let label_style = Style::default().fg(self.theme.text_secondary);
        let y_labels = [y_upper, (y_upper + y_lower) / 2.0, y_lower];
        let y_positions = [0u16, plot_height / 2, plot_height.saturating_sub(1)];
        for (value, y_pos) in y_labels.iter().zip(y_positions) {
            buf.set_string(inner.x, plot_top + y_pos, format!("{value:>7.2}"), label_style);
        }

        let shown = self.candles.len().min(plot_width as usize);
        let visible = &self.candles[self.candles.len() - shown..];

        for (i, candle) in visible.iter().enumerate() {
            let x = plot_left + i as u16;
            let is_up = candle.close >= candle.open;
            let style = Style::default().fg(self.theme.candle_color(candle.open, candle.close));

            let high_y = price_to_y(candle.high, y_lower, y_upper, plot_height);
            let low_y = price_to_y(candle.low, y_lower, y_upper, plot_height);
            let body_top = price_to_y(candle.open.max(candle.close), y_lower, y_upper, plot_height);
            let body_bot = price_to_y(candle.open.min(candle.close), y_lower, y_upper, plot_height);

            for y in high_y..body_top {
                buf.set_string(x, plot_top + y, "|", style);
            }
            let body = if is_up { "\u{2588}" } else { "\u{2593}" };
            for y in body_top..=body_bot {
                buf.set_string(x, plot_top + y, body, style);
            }
            for y in (body_bot + 1)..=low_y {
                buf.set_string(x, plot_top + y, "|", style);
            }
        }

        // date axis
        let axis_y = plot_top + plot_height;
        if let (Some(first), Some(last)) = (visible.first(), visible.last()) {
            buf.set_string(plot_left, axis_y, first.date.to_string(), label_style);
            let last_label = last.date.to_string();
            let last_x = plot_left + (shown as u16).saturating_sub(last_label.len() as u16);
            if shown > 2 * last_label.len() {
                buf.set_string(last_x, axis_y, last_label, label_style);
            }
        }
    }
}
