//! Option table: every combined row with its expiration label.

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::Modifier;
use ratatui::text::Span;
use ratatui::widgets::{Cell, Paragraph, Row, Table};

use optview_core::dashboard::DashboardData;
use optview_core::frame::LabeledEod;

use crate::theme;

const HEADERS: [&str; 10] = [
    "date", "expiration", "open", "high", "low", "close", "volume", "count", "bid", "ask",
];

fn cells(labeled: &LabeledEod) -> [String; 10] {
    let r = &labeled.row;
    [
        r.date.to_string(),
        labeled.expiration.label(),
        format!("{:.2}", r.open),
        format!("{:.2}", r.high),
        format!("{:.2}", r.low),
        format!("{:.2}", r.close),
        r.volume.to_string(),
        r.count.to_string(),
        format!("{:.2}", r.bid),
        format!("{:.2}", r.ask),
    ]
}

pub fn render(f: &mut Frame, area: Rect, data: &DashboardData, scroll: usize) {
    if let Some(msg) = data.no_option_data() {
        f.render_widget(Paragraph::new(Span::styled(msg, theme::warning())), area);
        return;
    }

    let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h)))
        .style(theme::accent_bold().add_modifier(Modifier::UNDERLINED));

    // one line for the header
    let visible = (area.height as usize).saturating_sub(1);
    let rows = data
        .history
        .rows()
        .iter()
        .skip(scroll)
        .take(visible)
        .map(|r| Row::new(cells(r)).style(theme::text()));

    let widths = [
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Length(8),
    ];
    f.render_widget(Table::new(rows, widths).header(header).column_spacing(1), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use optview_core::domain::{Expiration, OptionEod};

    #[test]
    fn row_cells_follow_headers() {
        let row = LabeledEod {
            expiration: Expiration(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
            row: OptionEod {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                open: 9.7,
                high: 10.0,
                low: 9.5,
                close: 9.8,
                volume: 1200,
                count: 300,
                bid: 9.75,
                ask: 9.85,
            },
        };
        let c = cells(&row);
        assert_eq!(c.len(), HEADERS.len());
        assert_eq!(c[0], "2024-01-02");
        assert_eq!(c[1], "2024-03-15");
        assert_eq!(c[5], "9.80");
        assert_eq!(c[6], "1200");
    }
}
