//! App state persistence: JSON save/load across restarts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use optview_core::session::{Selections, ViewFlags};

use crate::app::{AppState, Focus};

/// Serializable subset of app state that persists across restarts.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub selections: Option<Selections>,
    pub view: ViewFlags,
    pub focus: Focus,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            selections: None,
            view: ViewFlags::default(),
            focus: Focus::Sidebar,
        }
    }
}

/// Load persisted state from disk. Returns defaults if file is missing or corrupt.
pub fn load(path: &Path) -> PersistedState {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => PersistedState::default(),
    }
}

/// Save persisted state to disk. Creates parent directories if needed.
pub fn save(path: &Path, state: &PersistedState) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn extract(app: &AppState) -> PersistedState {
    PersistedState {
        selections: Some(app.selections.clone()),
        view: app.view,
        focus: app.focus,
    }
}

/// Restored picks are validated against fresh listings as the cascade runs.
/// The end date stays at the one the app started with (today).
pub fn apply(app: &mut AppState, state: PersistedState) {
    if let Some(selections) = state.selections {
        let end = app.selections.end;
        app.selections = Selections { end, ..selections };
    }
    app.view = state.view;
    app.focus = state.focus;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use optview_core::domain::{OptionRight, Strike};
    use optview_core::frame::DataField;
    use optview_core::session::ChartKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut selections = Selections::new(d(2023, 1, 1), d(2024, 2, 1));
        selections.symbol = Some("SPY".into());
        selections.right = OptionRight::Call;
        selections.strike = Some(Strike(450_000));
        let state = PersistedState {
            selections: Some(selections.clone()),
            view: ViewFlags {
                stock_chart: ChartKind::Candlestick,
                option_chart: ChartKind::Scatter,
                data_field: DataField::Volume,
            },
            focus: Focus::Option,
        };

        save(&path, &state).unwrap();
        let loaded = load(&path);

        assert_eq!(loaded.selections, Some(selections));
        assert_eq!(loaded.view.stock_chart, ChartKind::Candlestick);
        assert_eq!(loaded.view.data_field, DataField::Volume);
        assert_eq!(loaded.focus, Focus::Option);
    }

    #[test]
    fn apply_keeps_todays_end_date() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let today = d(2024, 6, 3);
        let mut app = AppState::new(tx, Selections::new(d(2023, 1, 1), today));

        let mut saved = Selections::new(d(2023, 6, 1), d(2024, 2, 1));
        saved.symbol = Some("QQQ".into());
        apply(
            &mut app,
            PersistedState {
                selections: Some(saved),
                ..PersistedState::default()
            },
        );

        assert_eq!(app.selections.symbol.as_deref(), Some("QQQ"));
        assert_eq!(app.selections.start, d(2023, 6, 1));
        assert_eq!(app.selections.end, today);
    }

    #[test]
    fn missing_file_returns_defaults() {
        let loaded = load(Path::new("/nonexistent/path/state.json"));
        assert!(loaded.selections.is_none());
        assert_eq!(loaded.view, ViewFlags::default());
        assert_eq!(loaded.focus, Focus::Sidebar);
    }

    #[test]
    fn corrupt_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).selections.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"focus":"Stock"}"#).unwrap();
        let loaded = load(&path);
        assert_eq!(loaded.focus, Focus::Stock);
        assert_eq!(loaded.view, ViewFlags::default());
    }
}
