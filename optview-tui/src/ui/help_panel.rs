//! Help overlay: keyboard shortcuts.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::theme;
use crate::ui::centered_rect;

pub fn render(f: &mut Frame, area: Rect) {
    let popup = centered_rect(70, 80, area);
    f.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::accent())
        .title(" Help [any key]close ")
        .title_style(theme::accent_bold());

    let mut lines: Vec<Line> = Vec::new();

    section(&mut lines, "Global");
    key(&mut lines, "Tab / Shift+Tab", "Cycle focus: sidebar, stock chart, option view");
    key(&mut lines, "t", "Toggle option display: chart / table");
    key(&mut lines, "r", "Reload the current selection");
    key(&mut lines, "e", "Error history");
    key(&mut lines, "?", "This help");
    key(&mut lines, "q", "Quit");
    lines.push(Line::from(""));

    section(&mut lines, "Sidebar");
    key(&mut lines, "j / k", "Move between fields");
    key(&mut lines, "h / l", "Previous / next value (dates step one day)");
    key(&mut lines, "/", "Search option roots");
    key(&mut lines, "Enter", "Type a date (YYYY-MM-DD) on date fields");
    lines.push(Line::from(""));

    section(&mut lines, "Stock chart");
    key(&mut lines, "l / s / c", "Line / Scatter / Candlestick");
    lines.push(Line::from(""));

    section(&mut lines, "Option view");
    key(&mut lines, "l / s / c", "Line / Scatter / Candlestick (chart mode)");
    key(&mut lines, "p / v", "Plot Price / Volume (chart mode)");
    key(&mut lines, "j / k", "Scroll rows (table mode)");

    f.render_widget(Paragraph::new(lines).block(block), popup);
}

fn section<'a>(lines: &mut Vec<Line<'a>>, title: &str) {
    lines.push(Line::from(Span::styled(title.to_string(), theme::accent_bold())));
}

fn key<'a>(lines: &mut Vec<Line<'a>>, keys: &str, desc: &str) {
    lines.push(Line::from(vec![
        Span::styled(format!("  {:>16}  ", keys), theme::accent()),
        Span::styled(desc.to_string(), theme::muted()),
    ]));
}
