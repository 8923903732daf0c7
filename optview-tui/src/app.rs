//! Application state: single-owner, main-thread only.
//!
//! All TUI state lives here. The worker thread communicates via channels.
//! Selections drive a re-fetch cascade: symbol → expirations → strikes →
//! dashboard load. Every request is tagged with a generation number and a
//! response is applied only if it answers the latest request of its kind.

use std::collections::VecDeque;
use std::sync::mpsc::Sender;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use optview_core::dashboard::DashboardData;
use optview_core::domain::{Expiration, Strike};
use optview_core::session::{Selections, ViewFlags};

use crate::worker::{WorkerCommand, WorkerResponse};

pub const ERROR_HISTORY_CAP: usize = 50;

/// Which region has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Focus {
    Sidebar,
    Stock,
    Option,
}

impl Focus {
    pub fn next(self) -> Focus {
        match self {
            Focus::Sidebar => Focus::Stock,
            Focus::Stock => Focus::Option,
            Focus::Option => Focus::Sidebar,
        }
    }

    pub fn prev(self) -> Focus {
        self.next().next()
    }
}

/// Rows of the selection sidebar, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarField {
    Symbol,
    OptionType,
    Expiration,
    Strike,
    AddMore,
    SecondaryExpiration,
    StartDate,
    EndDate,
    DisplayMode,
}

impl SidebarField {
    pub fn label(self) -> &'static str {
        match self {
            SidebarField::Symbol => "Select Symbol",
            SidebarField::OptionType => "Select Option Type",
            SidebarField::Expiration => "Select Expiration Date",
            SidebarField::Strike => "Select Strike Price",
            SidebarField::AddMore => "Add More Exercise Date Data?",
            SidebarField::SecondaryExpiration => "Select Additional Exercise Date",
            SidebarField::StartDate => "Start Date",
            SidebarField::EndDate => "End Date",
            SidebarField::DisplayMode => "Display Mode",
        }
    }

    /// Visible rows; the additional expiration only shows when enabled.
    pub fn visible(add_more: bool) -> Vec<SidebarField> {
        let mut fields = vec![
            SidebarField::Symbol,
            SidebarField::OptionType,
            SidebarField::Expiration,
            SidebarField::Strike,
            SidebarField::AddMore,
        ];
        if add_more {
            fields.push(SidebarField::SecondaryExpiration);
        }
        fields.extend([
            SidebarField::StartDate,
            SidebarField::EndDate,
            SidebarField::DisplayMode,
        ]);
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Start,
    End,
}

/// Which overlay (if any) is shown on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Help,
    ErrorHistory,
    SymbolSearch,
    DateInput(DateField),
}

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Error category for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Input,
    Other,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::Network => "NET",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Other => "ERR",
        }
    }
}

/// An error record for the error history overlay.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub category: ErrorCategory,
    pub message: String,
    pub context: String,
}

/// Generation each stage of the cascade is waiting for.
#[derive(Debug, Default, Clone, Copy)]
struct Pending {
    symbols: Option<u64>,
    expirations: Option<u64>,
    strikes: Option<u64>,
    load: Option<u64>,
}

/// Top-level application state.
pub struct AppState {
    pub running: bool,
    pub focus: Focus,
    pub overlay: Overlay,

    pub selections: Selections,
    pub view: ViewFlags,

    // Chain listings backing the sidebar
    pub symbols: Vec<String>,
    pub expirations: Vec<Expiration>,
    pub strikes: Vec<Strike>,
    pub sidebar_cursor: usize,

    // Last loaded view
    pub data: Option<DashboardData>,
    pub loading: bool,
    pub table_scroll: usize,

    // Text typed into the search or date overlay
    pub input_buffer: String,

    pub status_message: Option<(String, StatusLevel)>,
    pub error_history: VecDeque<ErrorRecord>,
    pub error_scroll: usize,

    worker_tx: Sender<WorkerCommand>,
    generation: u64,
    pending: Pending,
}

impl AppState {
    pub fn new(worker_tx: Sender<WorkerCommand>, selections: Selections) -> Self {
        Self {
            running: true,
            focus: Focus::Sidebar,
            overlay: Overlay::None,
            selections,
            view: ViewFlags::default(),
            symbols: Vec::new(),
            expirations: Vec::new(),
            strikes: Vec::new(),
            sidebar_cursor: 0,
            data: None,
            loading: false,
            table_scroll: 0,
            input_buffer: String::new(),
            status_message: None,
            error_history: VecDeque::with_capacity(ERROR_HISTORY_CAP),
            error_scroll: 0,
            worker_tx,
            generation: 0,
            pending: Pending::default(),
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn send(&mut self, cmd: WorkerCommand) {
        if self.worker_tx.send(cmd).is_err() {
            self.push_error(
                ErrorCategory::Other,
                "background worker stopped".into(),
                String::new(),
            );
        }
    }

    // ── cascade requests ────────────────────────────────────────────

    pub fn request_symbols(&mut self) {
        let generation = self.next_generation();
        self.pending = Pending {
            symbols: Some(generation),
            ..Pending::default()
        };
        self.set_status("Loading option roots...");
        self.send(WorkerCommand::ListSymbols { generation });
    }

    pub fn request_expirations(&mut self) {
        self.pending.strikes = None;
        self.pending.load = None;
        self.loading = false;
        let Some(symbol) = self.selections.symbol.clone() else {
            self.expirations.clear();
            self.strikes.clear();
            return;
        };
        let generation = self.next_generation();
        self.pending.expirations = Some(generation);
        self.send(WorkerCommand::ListExpirations { generation, symbol });
    }

    pub fn request_strikes(&mut self) {
        self.pending.load = None;
        self.loading = false;
        let (Some(symbol), Some(expiration)) =
            (self.selections.symbol.clone(), self.selections.expiration)
        else {
            self.strikes.clear();
            self.selections.strike = None;
            self.request_load();
            return;
        };
        let generation = self.next_generation();
        self.pending.strikes = Some(generation);
        self.send(WorkerCommand::ListStrikes {
            generation,
            symbol,
            expiration,
        });
    }

    pub fn request_load(&mut self) {
        if self.selections.symbol.is_none() {
            return;
        }
        let generation = self.next_generation();
        self.pending.load = Some(generation);
        self.loading = true;
        self.send(WorkerCommand::Load {
            generation,
            selections: Box::new(self.selections.clone()),
        });
    }

    // ── worker responses ────────────────────────────────────────────

    pub fn handle_response(&mut self, resp: WorkerResponse) {
        match resp {
            WorkerResponse::Symbols { generation, result } => {
                if self.pending.symbols != Some(generation) {
                    debug!(generation, "stale symbols response");
                    return;
                }
                self.pending.symbols = None;
                match result {
                    Ok(symbols) => self.apply_symbols(symbols),
                    Err(e) => self.push_error(ErrorCategory::Network, e, "list option roots".into()),
                }
            }
            WorkerResponse::Expirations {
                generation,
                symbol,
                result,
            } => {
                if self.pending.expirations != Some(generation)
                    || self.selections.symbol.as_deref() != Some(symbol.as_str())
                {
                    debug!(generation, %symbol, "stale expirations response");
                    return;
                }
                self.pending.expirations = None;
                match result {
                    Ok(exps) => self.apply_expirations(exps),
                    Err(e) => {
                        self.push_error(ErrorCategory::Network, e, format!("expirations for {symbol}"))
                    }
                }
            }
            WorkerResponse::Strikes {
                generation,
                expiration,
                result,
            } => {
                if self.pending.strikes != Some(generation)
                    || self.selections.expiration != Some(expiration)
                {
                    debug!(generation, %expiration, "stale strikes response");
                    return;
                }
                self.pending.strikes = None;
                match result {
                    Ok(strikes) => self.apply_strikes(strikes),
                    Err(e) => {
                        self.push_error(ErrorCategory::Network, e, format!("strikes for {expiration}"))
                    }
                }
            }
            WorkerResponse::Loaded { generation, result } => {
                if self.pending.load != Some(generation) {
                    debug!(generation, "stale load response");
                    return;
                }
                self.pending.load = None;
                self.loading = false;
                match result {
                    Ok(data) => self.apply_data(*data),
                    Err(e) => {
                        self.data = None;
                        let context = self.selections.symbol.clone().unwrap_or_default();
                        self.push_error(ErrorCategory::Network, e, context);
                    }
                }
            }
        }
    }

    fn apply_symbols(&mut self, symbols: Vec<String>) {
        self.symbols = symbols;
        let keep = self
            .selections
            .symbol
            .as_ref()
            .is_some_and(|s| self.symbols.contains(s));
        if !keep {
            self.selections.symbol = self.symbols.first().cloned();
            self.selections.reset_chain();
        }
        if self.symbols.is_empty() {
            self.set_warning("No option roots available");
        } else {
            self.set_status(format!("{} option roots", self.symbols.len()));
        }
        self.request_expirations();
    }

    fn apply_expirations(&mut self, exps: Vec<Expiration>) {
        self.expirations = exps;
        let first = self.expirations.first().copied();
        if !self.selections.expiration.is_some_and(|e| self.expirations.contains(&e)) {
            self.selections.expiration = first;
        }
        if !self
            .selections
            .secondary_expiration
            .is_some_and(|e| self.expirations.contains(&e))
        {
            self.selections.secondary_expiration = first;
        }
        self.request_strikes();
    }

    fn apply_strikes(&mut self, strikes: Vec<Strike>) {
        self.strikes = strikes;
        if !self.selections.strike.is_some_and(|s| self.strikes.contains(&s)) {
            self.selections.strike = self.strikes.first().copied();
        }
        self.request_load();
    }

    fn apply_data(&mut self, data: DashboardData) {
        self.table_scroll = 0;
        match data.messages.first() {
            Some(msg) => {
                warn!(symbol = %data.symbol, message = %msg, "dashboard notice");
                self.set_warning(msg.clone());
            }
            None => self.set_status(data.headline()),
        }
        self.data = Some(data);
    }

    // ── sidebar editing ─────────────────────────────────────────────

    pub fn visible_fields(&self) -> Vec<SidebarField> {
        SidebarField::visible(self.selections.add_more)
    }

    pub fn cursor_field(&self) -> SidebarField {
        let fields = self.visible_fields();
        fields[self.sidebar_cursor.min(fields.len() - 1)]
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.visible_fields().len() as isize;
        let next = (self.sidebar_cursor as isize + delta).clamp(0, len - 1);
        self.sidebar_cursor = next as usize;
    }

    /// Step the value of the focused sidebar row and trigger whatever part
    /// of the cascade depends on it.
    pub fn cycle_value(&mut self, forward: bool) {
        match self.cursor_field() {
            SidebarField::Symbol => {
                if let Some(symbol) = step(&self.symbols, self.selections.symbol.as_ref(), forward) {
                    self.select_symbol(symbol);
                }
            }
            SidebarField::OptionType => {
                self.selections.right = self.selections.right.toggle();
                self.request_load();
            }
            SidebarField::Expiration => {
                if let Some(exp) = step(&self.expirations, self.selections.expiration.as_ref(), forward) {
                    self.selections.expiration = Some(exp);
                    self.request_strikes();
                }
            }
            SidebarField::Strike => {
                if let Some(strike) = step(&self.strikes, self.selections.strike.as_ref(), forward) {
                    self.selections.strike = Some(strike);
                    self.request_load();
                }
            }
            SidebarField::AddMore => {
                self.selections.add_more = !self.selections.add_more;
                if self.selections.add_more && self.selections.secondary_expiration.is_none() {
                    self.selections.secondary_expiration = self.expirations.first().copied();
                }
                self.request_load();
            }
            SidebarField::SecondaryExpiration => {
                if let Some(exp) = step(
                    &self.expirations,
                    self.selections.secondary_expiration.as_ref(),
                    forward,
                ) {
                    self.selections.secondary_expiration = Some(exp);
                    self.request_load();
                }
            }
            SidebarField::StartDate => {
                let start = shift_day(self.selections.start, forward);
                self.set_date(DateField::Start, start);
            }
            SidebarField::EndDate => {
                let end = shift_day(self.selections.end, forward);
                self.set_date(DateField::End, end);
            }
            SidebarField::DisplayMode => self.toggle_display_mode(),
        }
    }

    pub fn select_symbol(&mut self, symbol: String) {
        if self.selections.symbol.as_deref() == Some(symbol.as_str()) {
            return;
        }
        self.selections.symbol = Some(symbol);
        self.selections.reset_chain();
        self.expirations.clear();
        self.strikes.clear();
        self.data = None;
        self.request_expirations();
    }

    /// First root equal to, else starting with, the typed text.
    pub fn search_symbol(&mut self, query: &str) {
        let query = query.trim().to_uppercase();
        if query.is_empty() {
            return;
        }
        let found = self
            .symbols
            .iter()
            .find(|s| **s == query)
            .or_else(|| self.symbols.iter().find(|s| s.starts_with(&query)))
            .cloned();
        match found {
            Some(symbol) => self.select_symbol(symbol),
            None => self.set_warning(format!("No option root matches '{query}'")),
        }
    }

    pub fn set_date(&mut self, field: DateField, date: NaiveDate) {
        match field {
            DateField::Start => self.selections.start = date,
            DateField::End => self.selections.end = date,
        }
        self.request_load();
    }

    pub fn toggle_display_mode(&mut self) {
        self.selections.display_mode = self.selections.display_mode.toggle();
        self.table_scroll = 0;
    }

    pub fn scroll_table(&mut self, delta: isize) {
        let rows = self.data.as_ref().map(|d| d.history.len()).unwrap_or(0);
        let max = rows.saturating_sub(1) as isize;
        self.table_scroll = (self.table_scroll as isize + delta).clamp(0, max.max(0)) as usize;
    }

    // ── status ──────────────────────────────────────────────────────

    /// Push an error to the history, capping at 50.
    pub fn push_error(&mut self, category: ErrorCategory, message: String, context: String) {
        warn!(category = category.label(), %message, %context, "error");
        let record = ErrorRecord {
            timestamp: chrono::Local::now().naive_local(),
            category,
            message: message.clone(),
            context,
        };
        self.error_history.push_front(record);
        if self.error_history.len() > ERROR_HISTORY_CAP {
            self.error_history.pop_back();
        }
        self.status_message = Some((message, StatusLevel::Error));
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }
}

/// Neighbour of `current` in `items`, wrapping. Starts at the first item
/// when `current` is absent.
fn step<T: Clone + PartialEq>(items: &[T], current: Option<&T>, forward: bool) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let len = items.len();
    let idx = match current.and_then(|c| items.iter().position(|i| i == c)) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None => 0,
    };
    Some(items[idx].clone())
}

fn shift_day(date: NaiveDate, forward: bool) -> NaiveDate {
    if forward {
        date + Duration::days(1)
    } else {
        date - Duration::days(1)
    }
}
