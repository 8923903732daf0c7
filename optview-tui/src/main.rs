//! optview TUI: option and stock history dashboard.
//!
//! Layout:
//! 1. Sidebar: symbol, option type, expirations, strike, date range
//! 2. Headline: symbol, company name, latest close
//! 3. Stock chart: line, scatter or candlestick of the daily close
//! 4. Option view: per-expiration chart or the combined table

mod app;
mod input;
mod persistence;
mod theme;
mod ui;
mod worker;

use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{info, warn};

use optview_core::config::AppConfig;
use optview_core::dashboard::Dashboard;
use optview_core::logging;
use optview_core::session::Selections;

use crate::app::AppState;
use crate::worker::WorkerCommand;

#[derive(Parser)]
#[command(name = "optview", about = "Option and stock history dashboard")]
struct Cli {
    /// Config file (default: <config dir>/optview/optview.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve everything from the parquet cache
    #[arg(long)]
    offline: bool,
}

fn state_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("optview")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    let state_dir = state_dir();
    let state_path = state_dir.join("state.json");
    if let Err(e) = logging::init_file(&state_dir.join("optview.log")) {
        eprintln!("warning: {e}");
    }

    let config = AppConfig::load(cli.config.as_deref()).context("loading config")?;
    let dashboard = Dashboard::from_config(&config, cli.offline).context("building providers")?;
    info!(offline = cli.offline, theta = %config.theta.base_url, "starting dashboard");

    // Worker channels
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    let worker_handle = worker::spawn_worker(Arc::new(dashboard), cmd_rx, resp_tx)
        .context("spawning worker thread")?;

    let today = Local::now().date_naive();
    let mut app = AppState::new(
        cmd_tx.clone(),
        Selections::new(config.dashboard.default_start, today),
    );
    persistence::apply(&mut app, persistence::load(&state_path));
    app.request_symbols();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app, &resp_rx);

    if let Err(e) = persistence::save(&state_path, &persistence::extract(&app)) {
        warn!(error = %e, "could not save state");
    }

    let _ = cmd_tx.send(WorkerCommand::Shutdown);
    let _ = worker_handle.join();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    responses: &mpsc::Receiver<worker::WorkerResponse>,
) -> Result<()> {
    loop {
        // 1. Render
        terminal.draw(|f| ui::draw(f, app))?;

        // 2. Drain worker responses (non-blocking)
        while let Ok(resp) = responses.try_recv() {
            app.handle_response(resp);
        }

        // 3. Poll for input events (50ms timeout for ~20 FPS tick)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                input::handle_key(app, key);
            }
        }

        if !app.running {
            break;
        }
    }
    Ok(())
}
