//! Selection sidebar: one labelled value per field.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::app::{AppState, Focus, SidebarField};
use crate::theme;
use crate::ui::panel_block;

const NONE: &str = "(none)";

pub fn field_value(app: &AppState, field: SidebarField) -> String {
    let s = &app.selections;
    match field {
        SidebarField::Symbol => s.symbol.clone().unwrap_or_else(|| NONE.into()),
        SidebarField::OptionType => s.right.label().to_string(),
        SidebarField::Expiration => s.expiration.map(|e| e.label()).unwrap_or_else(|| NONE.into()),
        SidebarField::Strike => s.strike.map(|k| k.to_string()).unwrap_or_else(|| NONE.into()),
        SidebarField::AddMore => (if s.add_more { "Yes" } else { "No" }).to_string(),
        SidebarField::SecondaryExpiration => s
            .secondary_expiration
            .map(|e| e.label())
            .unwrap_or_else(|| NONE.into()),
        SidebarField::StartDate => s.start.to_string(),
        SidebarField::EndDate => s.end.to_string(),
        SidebarField::DisplayMode => s.display_mode.label().to_string(),
    }
}

/// Size of the list a field cycles through, when it has one.
fn choices(app: &AppState, field: SidebarField) -> Option<usize> {
    match field {
        SidebarField::Symbol => Some(app.symbols.len()),
        SidebarField::Expiration | SidebarField::SecondaryExpiration => Some(app.expirations.len()),
        SidebarField::Strike => Some(app.strikes.len()),
        _ => None,
    }
}

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let focused = app.focus == Focus::Sidebar;
    let block = panel_block(" Options Dashboard ".into(), focused);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    for (i, field) in app.visible_fields().into_iter().enumerate() {
        let selected = focused && i == app.sidebar_cursor;
        lines.push(Line::from(Span::styled(field.label(), theme::muted())));

        let value = format!(" < {} > ", field_value(app, field));
        let value_style = if selected { theme::selected_row() } else { theme::text() };
        let mut spans = vec![Span::styled(value, value_style)];
        if let Some(n) = choices(app, field) {
            spans.push(Span::styled(format!(" {n}"), theme::neutral()));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use optview_core::domain::Strike;
    use optview_core::session::Selections;
    use std::sync::mpsc;

    #[test]
    fn values_for_defaults() {
        let (tx, _rx) = mpsc::channel();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut app = AppState::new(tx, Selections::new(start, end));
        assert_eq!(field_value(&app, SidebarField::Symbol), NONE);
        assert_eq!(field_value(&app, SidebarField::AddMore), "No");
        assert_eq!(field_value(&app, SidebarField::StartDate), "2023-01-01");
        assert_eq!(field_value(&app, SidebarField::DisplayMode), "Chart");

        app.selections.strike = Some(Strike(450_000));
        assert_eq!(
            field_value(&app, SidebarField::Strike),
            Strike(450_000).to_string()
        );
    }
}
