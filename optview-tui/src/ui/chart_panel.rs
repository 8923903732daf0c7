//! Stock and option charts: line/scatter through ratatui `Chart`,
//! candlesticks through the buffer widget.

use chrono::{Datelike, NaiveDate};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Chart, Dataset, GraphType, LegendPosition, Paragraph};

use optview_core::dashboard::DashboardData;
use optview_core::frame::DataField;
use optview_core::session::ChartKind;

use crate::theme::{self, Theme};
use crate::ui::candle::{candles_from_bars, candles_from_eod, CandleChart};

/// A plotted series; x is days from the common era.
struct Series {
    name: String,
    points: Vec<(f64, f64)>,
}

fn x_of(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn date_of(x: f64) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
}

/// Bounds over every point, padded so flat series still get a visible range.
fn bounds(series: &[Series]) -> Option<([f64; 2], [f64; 2])> {
    let mut points = series.iter().flat_map(|s| s.points.iter());
    let first = points.next()?;
    let (mut x0, mut x1, mut y0, mut y1) = (first.0, first.0, first.1, first.1);
    for &(x, y) in points {
        x0 = x0.min(x);
        x1 = x1.max(x);
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    if x1 - x0 < 1.0 {
        x1 = x0 + 1.0;
    }
    let pad = if y1 - y0 > 0.0 { (y1 - y0) * 0.05 } else { y0.abs().max(1.0) * 0.05 };
    Some(([x0, x1], [y0 - pad, y1 + pad]))
}

pub fn render_stock(f: &mut Frame, area: Rect, data: &DashboardData, kind: ChartKind) {
    if data.quotes.is_empty() {
        render_message(f, area, "No stock quotes for the selected range.");
        return;
    }
    match kind {
        ChartKind::Candlestick => {
            let candles = candles_from_bars(&data.quotes.bars);
            let theme = Theme::default();
            f.render_widget(CandleChart::new(&candles, &data.symbol, &theme), area);
        }
        ChartKind::Line | ChartKind::Scatter => {
            let series = vec![Series {
                name: "Close".into(),
                points: data.quotes.bars.iter().map(|b| (x_of(b.date), b.close)).collect(),
            }];
            render_xy(f, area, &series, kind, "Close");
        }
    }
}

pub fn render_option(
    f: &mut Frame,
    area: Rect,
    data: &DashboardData,
    kind: ChartKind,
    field: DataField,
) {
    if let Some(msg) = data.no_option_data() {
        render_message(f, area, msg);
        return;
    }
    match kind {
        ChartKind::Candlestick => render_option_candles(f, area, data),
        ChartKind::Line | ChartKind::Scatter => {
            let pivot = data.history.pivot(field);
            let series: Vec<Series> = pivot
                .column_labels()
                .into_iter()
                .enumerate()
                .map(|(i, name)| Series {
                    name,
                    points: pivot
                        .column_series(i)
                        .into_iter()
                        .map(|(d, v)| (x_of(d), v))
                        .collect(),
                })
                .collect();
            render_xy(f, area, &series, kind, field.label());
        }
    }
}

/// One candlestick chart per expiration, stacked.
fn render_option_candles(f: &mut Frame, area: Rect, data: &DashboardData) {
    let groups = data.history.split_by_expiration();
    if groups.is_empty() {
        return;
    }
    let constraints = vec![Constraint::Ratio(1, groups.len() as u32); groups.len()];
    let areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);
    let theme = Theme::default();
    for ((exp, rows), chunk) in groups.iter().zip(areas.iter()) {
        let candles = candles_from_eod(rows);
        let title = format!("Candlestick Chart for Expiration {exp}");
        f.render_widget(CandleChart::new(&candles, &title, &theme), *chunk);
    }
}

fn render_xy(f: &mut Frame, area: Rect, series: &[Series], kind: ChartKind, y_title: &str) {
    let Some((x_bounds, y_bounds)) = bounds(series) else {
        render_message(f, area, "Nothing to plot.");
        return;
    };

    let (graph_type, marker) = match kind {
        ChartKind::Scatter => (GraphType::Scatter, symbols::Marker::Dot),
        _ => (GraphType::Line, symbols::Marker::Braille),
    };

    let datasets: Vec<Dataset> = series
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Dataset::default()
                .name(s.name.clone())
                .marker(marker)
                .style(Style::default().fg(theme::series_color(i)))
                .graph_type(graph_type)
                .data(&s.points)
        })
        .collect();

    let x_labels: Vec<Span> = [x_bounds[0], (x_bounds[0] + x_bounds[1]) / 2.0, x_bounds[1]]
        .iter()
        .map(|&x| {
            let label = date_of(x).map(|d| d.to_string()).unwrap_or_default();
            Span::styled(label, theme::muted())
        })
        .collect();
    let y_labels: Vec<Span> = [y_bounds[0], (y_bounds[0] + y_bounds[1]) / 2.0, y_bounds[1]]
        .iter()
        .map(|y| Span::styled(format!("{y:.2}"), theme::muted()))
        .collect();

    let chart = Chart::new(datasets)
        .legend_position(Some(LegendPosition::TopLeft))
        .x_axis(
            Axis::default()
                .title(Span::styled("Date", theme::muted()))
                .style(theme::muted())
                .bounds(x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled(y_title.to_string(), theme::muted()))
                .style(theme::muted())
                .bounds(y_bounds)
                .labels(y_labels),
        );

    f.render_widget(chart, area);
}

fn render_message(f: &mut Frame, area: Rect, msg: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(msg.to_string(), theme::warning())),
    ];
    f.render_widget(Paragraph::new(lines), area);
}
