//! Background worker thread: every provider call runs here.
//!
//! Communication with the main thread is via `mpsc` channels. Each command
//! carries the generation number it was issued under, echoed back in the
//! response so the main thread can drop answers to superseded requests.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use optview_core::dashboard::{Dashboard, DashboardData};
use optview_core::domain::{Expiration, Strike};
use optview_core::session::Selections;
use tracing::{debug, info};

/// Commands sent from the TUI to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    ListSymbols {
        generation: u64,
    },
    ListExpirations {
        generation: u64,
        symbol: String,
    },
    ListStrikes {
        generation: u64,
        symbol: String,
        expiration: Expiration,
    },
    Load {
        generation: u64,
        selections: Box<Selections>,
    },
    Shutdown,
}

/// Responses sent from the worker back to the TUI. Errors travel as their
/// display strings.
#[derive(Debug)]
pub enum WorkerResponse {
    Symbols {
        generation: u64,
        result: Result<Vec<String>, String>,
    },
    Expirations {
        generation: u64,
        symbol: String,
        result: Result<Vec<Expiration>, String>,
    },
    Strikes {
        generation: u64,
        expiration: Expiration,
        result: Result<Vec<Strike>, String>,
    },
    Loaded {
        generation: u64,
        result: Result<Box<DashboardData>, String>,
    },
}

/// Spawn the background worker thread.
pub fn spawn_worker(
    dashboard: Arc<Dashboard>,
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResponse>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("optview-worker".into())
        .spawn(move || worker_loop(&dashboard, rx, tx))
}

fn worker_loop(dashboard: &Dashboard, rx: Receiver<WorkerCommand>, tx: Sender<WorkerResponse>) {
    loop {
        match rx.recv() {
            Ok(WorkerCommand::Shutdown) | Err(_) => break,
            Ok(cmd) => {
                let resp = handle_command(dashboard, cmd);
                if let Some(resp) = resp {
                    // main thread gone: nothing left to do
                    if tx.send(resp).is_err() {
                        break;
                    }
                }
            }
        }
    }
    info!("worker stopped");
}

fn handle_command(dashboard: &Dashboard, cmd: WorkerCommand) -> Option<WorkerResponse> {
    let loader = dashboard.loader();
    match cmd {
        WorkerCommand::ListSymbols { generation } => Some(WorkerResponse::Symbols {
            generation,
            result: loader.list_symbols().map_err(|e| e.to_string()),
        }),
        WorkerCommand::ListExpirations { generation, symbol } => {
            debug!(%symbol, generation, "listing expirations");
            let result = loader.list_expirations(&symbol).map_err(|e| e.to_string());
            Some(WorkerResponse::Expirations {
                generation,
                symbol,
                result,
            })
        }
        WorkerCommand::ListStrikes {
            generation,
            symbol,
            expiration,
        } => Some(WorkerResponse::Strikes {
            generation,
            expiration,
            result: loader
                .list_strikes(&symbol, expiration)
                .map_err(|e| e.to_string()),
        }),
        WorkerCommand::Load {
            generation,
            selections,
        } => Some(WorkerResponse::Loaded {
            generation,
            result: dashboard
                .load(&selections)
                .map(Box::new)
                .map_err(|e| e.to_string()),
        }),
        WorkerCommand::Shutdown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use optview_core::data::{InMemoryChain, InMemoryQuotes};
    use optview_core::domain::{OptionContract, OptionEod, OptionRight};
    use std::sync::mpsc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dashboard() -> Arc<Dashboard> {
        let contract = OptionContract::new(
            "QQQ",
            Expiration(d(2024, 3, 15)),
            Strike(400_000),
            OptionRight::Put,
        );
        let row = OptionEod {
            date: d(2024, 1, 2),
            open: 3.1,
            high: 3.4,
            low: 2.9,
            close: 3.2,
            volume: 88,
            count: 12,
            bid: 3.15,
            ask: 3.25,
        };
        Arc::new(Dashboard::new(
            Arc::new(InMemoryChain::new().with_history(contract, vec![row])),
            Arc::new(InMemoryQuotes::new()),
        ))
    }

    #[test]
    fn worker_shutdown() {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, _resp_rx) = mpsc::channel();
        let handle = spawn_worker(dashboard(), cmd_rx, resp_tx).unwrap();
        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().expect("worker should join cleanly");
    }

    #[test]
    fn responses_echo_generation() {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let handle = spawn_worker(dashboard(), cmd_rx, resp_tx).unwrap();

        cmd_tx
            .send(WorkerCommand::ListExpirations {
                generation: 7,
                symbol: "QQQ".into(),
            })
            .unwrap();
        match resp_rx.recv().unwrap() {
            WorkerResponse::Expirations {
                generation,
                symbol,
                result,
            } => {
                assert_eq!(generation, 7);
                assert_eq!(symbol, "QQQ");
                assert_eq!(result.unwrap(), vec![Expiration(d(2024, 3, 15))]);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn unlisted_symbol_cascades_to_no_data_notice() {
        use crate::app::{AppState, StatusLevel};
        use optview_core::dashboard::NO_DATA_MESSAGE;

        let db = dashboard();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let mut app = AppState::new(cmd_tx, Selections::new(d(2024, 1, 1), d(2024, 1, 31)));
        app.symbols = vec!["QQQ".into(), "XYZ".into()];
        app.select_symbol("XYZ".into());

        // run each command the app issues through the worker and feed the answer back
        let mut loaded = false;
        while let Ok(cmd) = cmd_rx.try_recv() {
            loaded |= matches!(cmd, WorkerCommand::Load { .. });
            if let Some(resp) = handle_command(&db, cmd) {
                app.handle_response(resp);
            }
        }

        assert!(loaded);
        assert!(app.error_history.is_empty());
        assert!(app.expirations.is_empty());
        let data = app.data.as_ref().unwrap();
        assert_eq!(data.messages, vec![NO_DATA_MESSAGE.to_string()]);
        assert_eq!(
            app.status_message,
            Some((NO_DATA_MESSAGE.to_string(), StatusLevel::Warning))
        );
    }

    #[test]
    fn load_errors_travel_as_strings() {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let handle = spawn_worker(dashboard(), cmd_rx, resp_tx).unwrap();

        // no symbol picked
        let selections = Selections::new(d(2024, 1, 1), d(2024, 1, 31));
        cmd_tx
            .send(WorkerCommand::Load {
                generation: 1,
                selections: Box::new(selections),
            })
            .unwrap();
        match resp_rx.recv().unwrap() {
            WorkerResponse::Loaded { result, .. } => {
                assert!(result.unwrap_err().contains("no symbol selected"));
            }
            other => panic!("unexpected response: {other:?}"),
        }

        cmd_tx.send(WorkerCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
