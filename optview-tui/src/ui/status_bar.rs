//! Bottom status bar: key hints and the last status message.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::app::{AppState, Focus, StatusLevel};
use crate::theme;

fn hints(focus: Focus) -> &'static str {
    match focus {
        Focus::Sidebar => " j/k:move h/l:change /:search Tab:focus ?:help",
        Focus::Stock => " l/s/c:chart type Tab:focus ?:help",
        Focus::Option => " l/s/c:chart p/v:field t:table j/k:scroll ?:help",
    }
}

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let mut spans: Vec<Span> = vec![Span::styled(hints(app.focus), theme::muted())];

    if app.loading {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled("loading", theme::neutral()));
    }

    spans.push(Span::raw(" | "));

    if let Some((msg, level)) = &app.status_message {
        let style = match level {
            StatusLevel::Info => theme::accent(),
            StatusLevel::Warning => theme::warning(),
            StatusLevel::Error => theme::negative(),
        };
        spans.push(Span::styled(msg.as_str(), style));
    }

    if !app.error_history.is_empty() {
        spans.push(Span::styled(
            format!("  [e] {} errors", app.error_history.len()),
            theme::negative(),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
