//! Parrot/neon theme tokens.
//!
//! # Color Palette
//! - **Background**: deep charcoal
//! - **Accent**: electric cyan (focus, highlights)
//! - **Positive**: neon green (up candles)
//! - **Negative**: hot pink (down candles, errors)
//! - **Warning**: neon orange
//! - **Neutral**: cool purple
//! - **Muted**: steel blue (secondary text)

use ratatui::style::{Color, Modifier, Style};

pub const BACKGROUND: Color = Color::Rgb(18, 18, 20);
pub const ACCENT: Color = Color::Rgb(0, 255, 255);
pub const POSITIVE: Color = Color::Rgb(0, 255, 128);
pub const NEGATIVE: Color = Color::Rgb(255, 20, 147);
pub const WARNING: Color = Color::Rgb(255, 140, 0);
pub const NEUTRAL: Color = Color::Rgb(147, 112, 219);
pub const MUTED: Color = Color::Rgb(100, 149, 237);
pub const TEXT_SECONDARY: Color = Color::Rgb(170, 170, 170);

/// Colors for successive chart series (one per expiration).
pub const SERIES: [Color; 6] = [ACCENT, WARNING, POSITIVE, NEUTRAL, NEGATIVE, Color::Yellow];

/// Colors the candlestick widget draws with.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub positive: Color,
    pub negative: Color,
    pub muted: Color,
    pub text_secondary: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::parrot_neon()
    }
}

impl Theme {
    pub fn parrot_neon() -> Self {
        Self {
            positive: POSITIVE,
            negative: NEGATIVE,
            muted: MUTED,
            text_secondary: TEXT_SECONDARY,
        }
    }

    /// Candle color: green when the close is at or above the open.
    pub fn candle_color(&self, open: f64, close: f64) -> Color {
        if close >= open {
            self.positive
        } else {
            self.negative
        }
    }
}

pub fn series_color(i: usize) -> Color {
    SERIES[i % SERIES.len()]
}

pub fn accent() -> Style {
    Style::default().fg(ACCENT)
}

pub fn accent_bold() -> Style {
    accent().add_modifier(Modifier::BOLD)
}

pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

pub fn warning() -> Style {
    Style::default().fg(WARNING)
}

pub fn negative() -> Style {
    Style::default().fg(NEGATIVE)
}

pub fn neutral() -> Style {
    Style::default().fg(NEUTRAL)
}

pub fn text() -> Style {
    Style::default().fg(Color::White)
}

pub fn panel_border(focused: bool) -> Style {
    if focused {
        accent()
    } else {
        Style::default().fg(TEXT_SECONDARY)
    }
}

pub fn panel_title(focused: bool) -> Style {
    if focused {
        accent_bold()
    } else {
        muted()
    }
}

/// Highlighted sidebar row.
pub fn selected_row() -> Style {
    Style::default()
        .fg(BACKGROUND)
        .bg(ACCENT)
        .add_modifier(Modifier::BOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_creation() {
        let theme = Theme::default();
        assert_eq!(theme.positive, Color::Rgb(0, 255, 128));
        assert_eq!(theme.muted, Color::Rgb(100, 149, 237));
    }

    #[test]
    fn test_candle_color() {
        let theme = Theme::default();
        assert_eq!(theme.candle_color(1.0, 1.5), theme.positive);
        assert_eq!(theme.candle_color(1.0, 1.0), theme.positive);
        assert_eq!(theme.candle_color(1.5, 1.0), theme.negative);
    }

    #[test]
    fn test_series_colors_wrap() {
        assert_eq!(series_color(0), ACCENT);
        assert_eq!(series_color(SERIES.len()), ACCENT);
        assert_ne!(series_color(0), series_color(1));
    }
}
