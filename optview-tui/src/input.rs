//! Keyboard input dispatch: overlays → global keys → focus-specific handlers.

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use optview_core::frame::DataField;
use optview_core::session::{ChartKind, DisplayMode};

use crate::app::{AppState, DateField, ErrorCategory, Focus, Overlay, SidebarField};

pub fn handle_key(app: &mut AppState, key: KeyEvent) {
    // Only handle key press events (Windows sends both Press and Release).
    if key.kind != KeyEventKind::Press {
        return;
    }

    // 1. Overlays consume input first.
    match app.overlay {
        Overlay::Help => {
            app.overlay = Overlay::None;
            return;
        }
        Overlay::ErrorHistory => {
            handle_error_overlay(app, key);
            return;
        }
        Overlay::SymbolSearch => {
            handle_search_overlay(app, key);
            return;
        }
        Overlay::DateInput(field) => {
            handle_date_overlay(app, field, key);
            return;
        }
        Overlay::None => {}
    }

    // 2. Global keys.
    match key.code {
        KeyCode::Char('q') => {
            app.running = false;
            return;
        }
        KeyCode::Char('?') => {
            app.overlay = Overlay::Help;
            return;
        }
        KeyCode::Char('e') => {
            app.overlay = Overlay::ErrorHistory;
            app.error_scroll = 0;
            return;
        }
        KeyCode::Char('t') => {
            app.toggle_display_mode();
            return;
        }
        KeyCode::Char('r') => {
            app.set_status("Reloading...");
            app.request_load();
            return;
        }
        KeyCode::Tab => {
            app.focus = if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.focus.prev()
            } else {
                app.focus.next()
            };
            return;
        }
        KeyCode::BackTab => {
            app.focus = app.focus.prev();
            return;
        }
        _ => {}
    }

    // 3. Focus-specific keys.
    match app.focus {
        Focus::Sidebar => handle_sidebar_key(app, key),
        Focus::Stock => {
            if let Some(kind) = chart_kind_key(key.code) {
                app.view.stock_chart = kind;
            }
        }
        Focus::Option => handle_option_key(app, key),
    }
}

fn chart_kind_key(code: KeyCode) -> Option<ChartKind> {
    match code {
        KeyCode::Char('l') => Some(ChartKind::Line),
        KeyCode::Char('s') => Some(ChartKind::Scatter),
        KeyCode::Char('c') => Some(ChartKind::Candlestick),
        _ => None,
    }
}

fn handle_sidebar_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => app.move_cursor(-1),
        KeyCode::Char('l') | KeyCode::Right => app.cycle_value(true),
        KeyCode::Char('h') | KeyCode::Left => app.cycle_value(false),
        KeyCode::Char('/') => {
            app.input_buffer.clear();
            app.overlay = Overlay::SymbolSearch;
        }
        KeyCode::Enter => match app.cursor_field() {
            SidebarField::Symbol => {
                app.input_buffer.clear();
                app.overlay = Overlay::SymbolSearch;
            }
            SidebarField::StartDate => open_date_input(app, DateField::Start),
            SidebarField::EndDate => open_date_input(app, DateField::End),
            _ => app.cycle_value(true),
        },
        _ => {}
    }
}

fn open_date_input(app: &mut AppState, field: DateField) {
    let current = match field {
        DateField::Start => app.selections.start,
        DateField::End => app.selections.end,
    };
    app.input_buffer = current.format("%Y-%m-%d").to_string();
    app.overlay = Overlay::DateInput(field);
}

fn handle_option_key(app: &mut AppState, key: KeyEvent) {
    match app.selections.display_mode {
        DisplayMode::Chart => {
            if let Some(kind) = chart_kind_key(key.code) {
                app.view.option_chart = kind;
                return;
            }
            match key.code {
                KeyCode::Char('p') => app.view.data_field = DataField::Price,
                KeyCode::Char('v') => app.view.data_field = DataField::Volume,
                _ => {}
            }
        }
        DisplayMode::Table => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.scroll_table(1),
            KeyCode::Char('k') | KeyCode::Up => app.scroll_table(-1),
            KeyCode::PageDown => app.scroll_table(20),
            KeyCode::PageUp => app.scroll_table(-20),
            KeyCode::Char('g') => app.table_scroll = 0,
            _ => {}
        },
    }
}

fn handle_error_overlay(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('e') => {
            app.overlay = Overlay::None;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.error_scroll + 1 < app.error_history.len() {
                app.error_scroll += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.error_scroll = app.error_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

fn handle_search_overlay(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.overlay = Overlay::None;
            app.input_buffer.clear();
        }
        KeyCode::Enter => {
            let query = std::mem::take(&mut app.input_buffer);
            app.overlay = Overlay::None;
            app.search_symbol(&query);
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char(c) => app.input_buffer.push(c),
        _ => {}
    }
}

fn handle_date_overlay(app: &mut AppState, field: DateField, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.overlay = Overlay::None;
            app.input_buffer.clear();
        }
        KeyCode::Enter => {
            let text = std::mem::take(&mut app.input_buffer);
            app.overlay = Overlay::None;
            match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                Ok(date) => app.set_date(field, date),
                Err(_) => app.push_error(
                    ErrorCategory::Input,
                    format!("invalid date '{}', expected YYYY-MM-DD", text.trim()),
                    "date input".into(),
                ),
            }
        }
        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => app.input_buffer.push(c),
        _ => {}
    }
}
