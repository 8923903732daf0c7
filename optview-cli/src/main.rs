//! optview CLI: option chains, EOD history and stock quotes without the UI.
//!
//! Commands:
//! - `roots`: list option roots
//! - `expirations`: expirations of a root, newest first
//! - `strikes`: strikes of one expiration
//! - `eod`: the dashboard load: headline, notices, combined table or pivot
//! - `quote`: headline and daily bars of the underlying
//! - `cache`: what the parquet cache holds

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use optview_core::config::AppConfig;
use optview_core::dashboard::{Dashboard, DashboardData};
use optview_core::data::ParquetCache;
use optview_core::domain::{parse_date, DateRange, Expiration, OptionRight, Strike};
use optview_core::frame::{DataField, OptionHistory, PivotTable};
use optview_core::logging;
use optview_core::session::Selections;

#[derive(Parser)]
#[command(name = "optview-cli", about = "Option and stock history from the command line")]
struct Cli {
    /// Config file (default: <config dir>/optview/optview.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serve everything from the parquet cache.
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,

    /// Bypass the parquet cache.
    #[arg(long, global = true, default_value_t = false, conflicts_with = "offline")]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List option roots.
    Roots,
    /// List expirations of a root, newest first.
    Expirations { symbol: String },
    /// List strikes of one expiration.
    Strikes {
        symbol: String,
        /// Expiration (YYYY-MM-DD).
        #[arg(long)]
        exp: String,
    },
    /// Option EOD history with the underlying's headline.
    Eod {
        symbol: String,
        /// Expiration (YYYY-MM-DD).
        #[arg(long)]
        exp: String,
        /// Strike in dollars (e.g. 470 or 472.5).
        #[arg(long)]
        strike: String,
        /// call / put (or C / P).
        #[arg(long, default_value = "put")]
        right: String,
        /// Additional expiration overlaid on the first.
        #[arg(long)]
        secondary_exp: Option<String>,
        /// Start date (YYYY-MM-DD). Defaults to the configured start.
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,
        /// Print the per-expiration pivot of this field instead of the rows.
        #[arg(long, value_enum)]
        pivot: Option<PivotField>,
        /// Also write the printed table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Daily bars of the underlying.
    Quote {
        symbol: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Summarize the parquet cache.
    Cache,
}

#[derive(Clone, Copy, ValueEnum)]
enum PivotField {
    Price,
    Volume,
}

impl From<PivotField> for DataField {
    fn from(f: PivotField) -> Self {
        match f {
            PivotField::Price => DataField::Price,
            PivotField::Volume => DataField::Volume,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = logging::init_stderr() {
        eprintln!("warning: {e}");
    }

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading config")?;
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let offline = cli.offline;
    let dashboard = || Dashboard::from_config(&config, offline).context("building providers");
    let today = chrono::Local::now().date_naive();
    let default_start = config.dashboard.default_start;

    match cli.command {
        Commands::Roots => {
            for root in dashboard()?.loader().list_symbols()? {
                println!("{root}");
            }
        }
        Commands::Expirations { symbol } => {
            let symbol = symbol.to_uppercase();
            let exps = dashboard()?.loader().list_expirations(&symbol)?;
            if exps.is_empty() {
                eprintln!("No options listed for {symbol}");
            }
            for exp in exps {
                println!("{exp}");
            }
        }
        Commands::Strikes { symbol, exp } => {
            let symbol = symbol.to_uppercase();
            let exp: Expiration = exp.parse()?;
            let strikes = dashboard()?.loader().list_strikes(&symbol, exp)?;
            if strikes.is_empty() {
                eprintln!("No strikes listed for {symbol} {exp}");
            }
            for strike in strikes {
                println!("{:.3}", strike.dollars());
            }
        }
        Commands::Eod {
            symbol,
            exp,
            strike,
            right,
            secondary_exp,
            start,
            end,
            pivot,
            csv,
        } => {
            let mut selections = Selections::new(
                date_or(start.as_deref(), default_start)?,
                date_or(end.as_deref(), today)?,
            );
            selections.symbol = Some(symbol.to_uppercase());
            selections.expiration = Some(exp.parse()?);
            selections.strike = Some(strike.parse::<Strike>()?);
            selections.right = right.parse::<OptionRight>()?;
            if let Some(secondary) = secondary_exp {
                selections.add_more = true;
                selections.secondary_expiration = Some(secondary.parse()?);
            }
            debug!(?selections, "eod request");

            let data = dashboard()?.load(&selections)?;
            run_eod(&data, pivot.map(DataField::from), csv.as_deref())?;
        }
        Commands::Quote { symbol, start, end } => {
            let range = DateRange::new(
                date_or(start.as_deref(), default_start)?,
                date_or(end.as_deref(), today)?,
            )?;
            let symbol = symbol.to_uppercase();
            let quotes = dashboard()?.stock_quotes(&symbol, range)?;
            let data = DashboardData {
                symbol,
                long_name: quotes.long_name.clone(),
                quotes,
                history: OptionHistory::empty(),
                messages: Vec::new(),
                primary_expiration: None,
                secondary_expiration: None,
            };
            println!("{}", data.headline());
            println!();
            println!(
                "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10} {:>12}",
                "Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"
            );
            println!("{}", "-".repeat(82));
            for b in &data.quotes.bars {
                println!(
                    "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12}",
                    b.date, b.open, b.high, b.low, b.close, b.adj_close, b.volume
                );
            }
        }
        Commands::Cache => run_cache(&config.cache.dir)?,
    }
    Ok(())
}

fn date_or(arg: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    Ok(arg.map(parse_date).transpose()?.unwrap_or(default))
}

fn run_eod(data: &DashboardData, pivot: Option<DataField>, csv_path: Option<&Path>) -> Result<()> {
    println!("{}", data.headline());
    if let Some(exps) = data.expirations_label() {
        println!("Expirations: {exps}");
    }
    for msg in &data.messages {
        println!("{msg}");
    }
    if let Some(msg) = data.no_option_data() {
        println!("{msg}");
        return Ok(());
    }

    match pivot {
        Some(field) => {
            let table = data.history.pivot(field);
            println!("{}", DashboardData::option_title(field));
            println!("{}", table.to_dataframe()?);
            if let Some(path) = csv_path {
                write_pivot_csv(path, &table)?;
            }
        }
        None => {
            println!("{}", data.history.to_dataframe()?);
            if let Some(path) = csv_path {
                write_history_csv(path, &data.history)?;
            }
        }
    }
    if let Some(path) = csv_path {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn write_history_csv(path: &Path, history: &OptionHistory) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "date", "expiration", "open", "high", "low", "close", "volume", "count", "bid", "ask",
    ])?;
    for labeled in history.rows() {
        let r = &labeled.row;
        writer.write_record([
            r.date.to_string(),
            labeled.expiration.label(),
            r.open.to_string(),
            r.high.to_string(),
            r.low.to_string(),
            r.close.to_string(),
            r.volume.to_string(),
            r.count.to_string(),
            r.bid.to_string(),
            r.ask.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Empty cells where an expiration has no row that day.
fn write_pivot_csv(path: &Path, table: &PivotTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["date".to_string()];
    header.extend(table.column_labels());
    writer.write_record(&header)?;
    for (date, row) in table.index.iter().zip(&table.cells) {
        let mut record = vec![date.to_string()];
        record.extend(row.iter().map(|c| c.map(|v| v.to_string()).unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_cache(dir: &Path) -> Result<()> {
    if !dir.exists() {
        println!("Cache directory does not exist: {}", dir.display());
        return Ok(());
    }
    let cache = ParquetCache::new(dir);
    let roots = cache.cached_roots();
    println!("Cache: {}", cache.cache_dir().display());
    println!("Option roots: {}", roots.len());
    if roots.is_empty() {
        return Ok(());
    }
    println!();
    println!("{:<8} {:>12} {:>10}  {:<24}", "Root", "Expirations", "Contracts", "Range");
    println!("{}", "-".repeat(58));
    for root in roots {
        let exps = cache.cached_expirations(&root);
        let contracts: usize = exps.iter().map(|e| cache.cached_strikes(&root, *e).len()).sum();
        let range = match (exps.first(), exps.last()) {
            (Some(first), Some(last)) => format!("{first} .. {last}"),
            _ => String::new(),
        };
        println!("{:<8} {:>12} {:>10}  {:<24}", root, exps.len(), contracts, range);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use optview_core::domain::OptionEod;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn eod(day: u32, close: f64) -> OptionEod {
        OptionEod {
            date: d(1, day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
            count: 1,
            bid: close,
            ask: close,
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_eod_flags() {
        let cli = Cli::try_parse_from([
            "optview-cli", "--offline", "eod", "spy", "--exp", "2024-03-15", "--strike", "470",
            "--pivot", "volume",
        ])
        .unwrap();
        assert!(cli.offline);
        match cli.command {
            Commands::Eod { symbol, right, pivot, .. } => {
                assert_eq!(symbol, "spy");
                assert_eq!(right, "put");
                assert!(matches!(pivot, Some(PivotField::Volume)));
            }
            _ => panic!("expected eod"),
        }
    }

    #[test]
    fn offline_and_no_cache_conflict() {
        assert!(Cli::try_parse_from(["optview-cli", "--offline", "--no-cache", "roots"]).is_err());
    }

    #[test]
    fn pivot_csv_leaves_gaps_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pivot.csv");
        let history = OptionHistory::combine(
            OptionHistory::label(Expiration(d(3, 15)), vec![eod(2, 9.8), eod(3, 8.9)]),
            Some(OptionHistory::label(Expiration(d(4, 19)), vec![eod(3, 12.1)])),
        );
        write_pivot_csv(&path, &history.pivot(DataField::Price)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,2024-03-15,2024-04-19");
        assert_eq!(lines[1], "2024-01-02,9.8,");
        assert_eq!(lines[2], "2024-01-03,8.9,12.1");
    }

    #[test]
    fn history_csv_has_one_line_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let history = OptionHistory::label(Expiration(d(3, 15)), vec![eod(2, 9.8), eod(3, 8.9)]);
        write_history_csv(&path, &history).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().starts_with("2024-01-02,2024-03-15,"));
    }
}
