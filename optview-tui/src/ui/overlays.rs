//! Overlay widgets: error history, symbol search, date input.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::app::{AppState, DateField};
use crate::theme;
use crate::ui::centered_rect;

/// Error history overlay.
pub fn render_error_history(f: &mut Frame, area: Rect, app: &AppState) {
    let popup = centered_rect(80, 70, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::negative())
        .title(format!(
            " Error History ({}) [Esc]close [j/k]scroll ",
            app.error_history.len()
        ))
        .title_style(theme::negative());

    let inner = block.inner(popup);
    f.render_widget(block, popup);

    if app.error_history.is_empty() {
        let text = Paragraph::new(Span::styled("No errors recorded.", theme::muted()));
        f.render_widget(text, inner);
        return;
    }

    let visible_height = inner.height as usize;
    let start = app.error_scroll;
    let end = (start + visible_height).min(app.error_history.len());

    let mut lines: Vec<Line> = Vec::new();
    for (i, err) in app.error_history.iter().enumerate().take(end).skip(start) {
        let style = if i == app.error_scroll {
            theme::negative().add_modifier(Modifier::BOLD)
        } else {
            theme::muted()
        };

        lines.push(Line::from(vec![
            Span::styled(format!("[{}] ", err.timestamp.format("%H:%M:%S")), theme::muted()),
            Span::styled(format!("[{}] ", err.category.label()), theme::warning()),
            Span::styled(err.message.as_str(), style),
        ]));

        if !err.context.is_empty() {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(err.context.as_str(), theme::muted()),
            ]));
        }
    }

    f.render_widget(Paragraph::new(lines), inner);
}

/// Option-root search with prefix matches listed under the prompt.
pub fn render_search(f: &mut Frame, area: Rect, app: &AppState) {
    let popup = centered_rect(50, 40, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::accent())
        .title(" Find Symbol [Enter]select [Esc]cancel ")
        .title_style(theme::accent_bold());

    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let query = app.input_buffer.trim().to_uppercase();
    let mut lines = vec![
        Line::from(Span::styled("Option root:", theme::muted())),
        Line::from(vec![
            Span::styled("> ", theme::accent()),
            Span::styled(app.input_buffer.as_str(), theme::accent_bold()),
            Span::styled("_", theme::accent()),
        ]),
        Line::from(""),
    ];

    let room = (inner.height as usize).saturating_sub(lines.len());
    let matches = app
        .symbols
        .iter()
        .filter(|s| !query.is_empty() && s.starts_with(&query))
        .take(room);
    lines.extend(matches.map(|s| Line::from(Span::styled(format!("  {s}"), theme::text()))));

    f.render_widget(Paragraph::new(lines), inner);
}

pub fn render_date_input(f: &mut Frame, area: Rect, field: DateField, input: &str) {
    let popup = centered_rect(40, 20, area);
    f.render_widget(Clear, popup);

    let title = match field {
        DateField::Start => " Start Date ",
        DateField::End => " End Date ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::accent())
        .title(title)
        .title_style(theme::accent_bold());

    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let text = vec![
        Line::from(Span::styled("YYYY-MM-DD  [Enter]apply [Esc]cancel", theme::muted())),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", theme::accent()),
            Span::styled(input, theme::accent_bold()),
            Span::styled("_", theme::accent()),
        ]),
    ];
    f.render_widget(Paragraph::new(text), inner);
}
