//! Top-level UI layout: sidebar, headline, stock view, option view, status bar.

pub mod candle;
pub mod chart_panel;
pub mod help_panel;
pub mod overlays;
pub mod sidebar;
pub mod status_bar;
pub mod table_panel;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use optview_core::dashboard::DashboardData;
use optview_core::session::DisplayMode;

use crate::app::{AppState, Focus, Overlay};
use crate::theme;

pub fn draw(f: &mut Frame, app: &AppState) {
    // Split: main area + 1-line status bar.
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());
    let (main_area, status_area) = (rows[0], rows[1]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(38), Constraint::Min(20)])
        .split(main_area);

    sidebar::render(f, cols[0], app);
    draw_main(f, cols[1], app);
    status_bar::render(f, status_area, app);

    match app.overlay {
        Overlay::Help => help_panel::render(f, main_area),
        Overlay::ErrorHistory => overlays::render_error_history(f, main_area, app),
        Overlay::SymbolSearch => overlays::render_search(f, main_area, app),
        Overlay::DateInput(field) => overlays::render_date_input(f, main_area, field, &app.input_buffer),
        Overlay::None => {}
    }
}

fn draw_main(f: &mut Frame, area: Rect, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Percentage(45),
            Constraint::Min(5),
        ])
        .split(area);

    let Some(data) = &app.data else {
        let text = if app.loading {
            "Loading..."
        } else if app.selections.symbol.is_none() {
            "No symbol selected"
        } else {
            "No data loaded"
        };
        f.render_widget(Paragraph::new(Span::styled(text, theme::muted())), chunks[0]);
        return;
    };

    render_headline(f, chunks[0], data, app.loading);

    let stock_block = panel_block(
        format!(" Stock Price Chart ({}) ", app.view.stock_chart.label()),
        app.focus == Focus::Stock,
    );
    let inner = stock_block.inner(chunks[1]);
    f.render_widget(stock_block, chunks[1]);
    chart_panel::render_stock(f, inner, data, app.view.stock_chart);

    let mut option_title = format!(
        " {} [{}] ",
        DashboardData::option_title(app.view.data_field),
        app.selections.display_mode.label()
    );
    if let Some(exps) = data.expirations_label() {
        option_title.push_str(&format!("{exps} "));
    }
    let option_block = panel_block(option_title, app.focus == Focus::Option);
    let inner = option_block.inner(chunks[2]);
    f.render_widget(option_block, chunks[2]);
    match app.selections.display_mode {
        DisplayMode::Chart => {
            chart_panel::render_option(f, inner, data, app.view.option_chart, app.view.data_field)
        }
        DisplayMode::Table => table_panel::render(f, inner, data, app.table_scroll),
    }
}

fn render_headline(f: &mut Frame, area: Rect, data: &DashboardData, loading: bool) {
    let mut spans = vec![Span::styled(data.headline(), theme::accent_bold())];
    if loading {
        spans.push(Span::styled("  (refreshing)", theme::muted()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn panel_block<'a>(title: String, focused: bool) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(focused))
        .title(title)
        .title_style(theme::panel_title(focused))
}

/// Compute a centered rect for overlays.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
