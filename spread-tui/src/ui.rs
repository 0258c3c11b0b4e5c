use crate::app::{App, listing_rows};
use chrono::DateTime;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
};
use spread_engine::{
    ChannelStatus, ChartStatus, ListingRow, ListingView, Rgb, SeriesKey, Side, TimeFrameUnit,
    to_percentage,
};
use spread_feed::DashboardSnapshot;

const SERVER_ERROR: &str = "Server error! Please refresh.";

pub fn render_ui(f: &mut Frame, snapshot: &DashboardSnapshot, app: &App) {
    if let ListingView::Failed(failure) = &snapshot.listing {
        render_server_error(f, &failure.to_string());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Percentage(55),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_controls(f, snapshot, app, chunks[0]);
    render_chart(f, snapshot, chunks[1]);
    render_listing(f, snapshot, app, chunks[2]);
    render_help(f, chunks[3]);
}

fn render_server_error(f: &mut Frame, detail: &str) {
    let lines = vec![
        Line::from(Span::styled(
            SERVER_ERROR,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(detail, Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from("R: refresh   q: quit"),
    ];

    let area = f.area();
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(7),
            Constraint::Percentage(40),
        ])
        .split(area);

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, vertical[1]);
}

fn render_controls(f: &mut Frame, snapshot: &DashboardSnapshot, app: &App, area: Rect) {
    let controls = &snapshot.controls;

    let mode = if controls.is_live {
        Span::styled(" LIVE ", Style::default().fg(Color::Black).bg(Color::Green))
    } else {
        Span::styled(" HISTORICAL ", Style::default().fg(Color::Black).bg(Color::Cyan))
    };

    let range_style = if controls.range_enabled {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let mut spans = vec![
        mode,
        Span::raw("  time frame: "),
        Span::styled(controls.unit.to_string(), range_style),
        Span::raw("  range: "),
        Span::styled(app.range.label(), range_style),
        Span::raw(format!(
            "  page {} (size {})  chart: {}  channel: {}",
            controls.page,
            controls.page_size,
            chart_status_label(&snapshot.chart_status),
            channel_label(&controls.channel),
        )),
    ];

    if let Some(rejection) = &snapshot.rejection {
        spans.push(Span::styled(
            format!("  {rejection}"),
            Style::default().fg(Color::Yellow),
        ));
    }

    let block = Block::default()
        .title(" SPREADS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_chart(f: &mut Frame, snapshot: &DashboardSnapshot, area: Rect) {
    let block = Block::default()
        .title(" SPREAD % ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    if snapshot.series.is_empty() {
        let hint = Paragraph::new("Select a buy or sell spread below (b / s) to chart it")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(hint, area);
        return;
    }

    let points: Vec<Vec<(f64, f64)>> = snapshot
        .series
        .iter()
        .map(|series| {
            series
                .points
                .iter()
                .map(|point| (point.x.timestamp_millis() as f64, point.y.as_f64()))
                .collect()
        })
        .collect();

    let datasets = snapshot
        .series
        .iter()
        .zip(&points)
        .map(|(series, data)| {
            Dataset::default()
                .name(series.label.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(to_color(series.color)))
                .data(data)
        })
        .collect::<Vec<_>>();

    let (x_bounds, y_bounds) = bounds(&points);
    let unit = snapshot.controls.unit;
    let x_labels = [x_bounds[0], (x_bounds[0] + x_bounds[1]) / 2.0, x_bounds[1]]
        .into_iter()
        .map(|millis| Span::raw(axis_time(millis, unit)))
        .collect::<Vec<_>>();
    let y_labels = [y_bounds[0], (y_bounds[0] + y_bounds[1]) / 2.0, y_bounds[1]]
        .into_iter()
        .map(|value| Span::raw(format!("{value:.2}%")))
        .collect::<Vec<_>>();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(y_labels),
        );
    f.render_widget(chart, area);
}

fn render_listing(f: &mut Frame, snapshot: &DashboardSnapshot, app: &App, area: Rect) {
    let controls = &snapshot.controls;
    let title = format!(
        " PAIRS  {}page {}{} ",
        if controls.can_prev { "< " } else { "" },
        controls.page,
        if controls.can_next { " >" } else { "" },
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    if matches!(snapshot.listing, ListingView::Loading) {
        f.render_widget(Paragraph::new("Loading...").block(block), area);
        return;
    }

    let toggles_enabled = controls.toggles_enabled;
    let header = Row::new(
        ["Buy", "Sell", "Pair", "Leg A", "Leg B", "Buy %", "Sell %", "Updated"]
            .into_iter()
            .map(|title| Cell::from(title).style(Style::default().add_modifier(Modifier::BOLD))),
    );

    let rows = listing_rows(snapshot)
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let style = if index == app.cursor {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Row::new(vec![
                selection_cell(snapshot, row, Side::Buy, toggles_enabled),
                selection_cell(snapshot, row, Side::Sell, toggles_enabled),
                Cell::from(row.pair.name.clone()),
                Cell::from(row.pair.leg_a_name.clone()),
                Cell::from(row.pair.leg_b_name.clone()),
                spread_cell(row.buy_spread),
                spread_cell(row.sell_spread),
                Cell::from(row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            ])
            .style(style)
        })
        .collect::<Vec<_>>();

    let widths = [
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Min(12),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(20),
    ];

    let table = Table::new(rows, widths).header(header).block(block);
    f.render_widget(table, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let help = "↑/↓ row  b/s toggle  n/p page  +/- size  t time frame  r range  l live  R refresh  q quit";
    f.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn selection_cell(
    snapshot: &DashboardSnapshot,
    row: &ListingRow,
    side: Side,
    enabled: bool,
) -> Cell<'static> {
    let key = SeriesKey::new(row.pair.id.clone(), side);
    let mark = if snapshot.is_selected(&key) { "[x]" } else { "[ ]" };
    let style = if enabled {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Cell::from(mark).style(style)
}

fn spread_cell(spread: Option<f64>) -> Cell<'static> {
    match spread.and_then(to_percentage) {
        Some(percentage) => {
            let color = if percentage.is_negative() {
                Color::Red
            } else {
                Color::Green
            };
            Cell::from(format!("{percentage}%")).style(Style::default().fg(color))
        }
        None => Cell::from("-").style(Style::default().fg(Color::DarkGray)),
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

fn chart_status_label(status: &ChartStatus) -> String {
    match status {
        ChartStatus::Idle => "idle".to_string(),
        ChartStatus::Fetching => "fetching".to_string(),
        ChartStatus::Settled => "ok".to_string(),
        ChartStatus::Failed(failure) => format!("error ({})", failure.message),
    }
}

fn channel_label(status: &ChannelStatus) -> &'static str {
    match status {
        ChannelStatus::Idle => "idle",
        ChannelStatus::Connecting => "connecting",
        ChannelStatus::Connected => "connected",
        ChannelStatus::Failed(_) => "reconnecting",
    }
}

fn axis_time(millis: f64, unit: TimeFrameUnit) -> String {
    DateTime::from_timestamp_millis(millis as i64)
        .map(|time| time.format(unit.axis_format()).to_string())
        .unwrap_or_default()
}

/// Axis bounds over every point, padded so flat or single point series stay visible.
fn bounds(points: &[Vec<(f64, f64)>]) -> ([f64; 2], [f64; 2]) {
    let mut x = [f64::MAX, f64::MIN];
    let mut y = [f64::MAX, f64::MIN];
    for &(px, py) in points.iter().flatten() {
        x = [x[0].min(px), x[1].max(px)];
        y = [y[0].min(py), y[1].max(py)];
    }

    if x[0] > x[1] {
        return ([0.0, 1.0], [0.0, 1.0]);
    }
    if x[0] == x[1] {
        x = [x[0] - 60_000.0, x[1] + 60_000.0];
    }
    let padding = ((y[1] - y[0]) * 0.1).max(0.25);
    (x, [y[0] - padding, y[1] + padding])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        struct TestCase {
            input: Vec<Vec<(f64, f64)>>,
            expected: ([f64; 2], [f64; 2]),
        }

        let tests = vec![
            TestCase {
                // TC0: no points
                input: vec![vec![]],
                expected: ([0.0, 1.0], [0.0, 1.0]),
            },
            TestCase {
                // TC1: single point widened on both axes
                input: vec![vec![(120_000.0, 1.0)]],
                expected: ([60_000.0, 180_000.0], [0.75, 1.25]),
            },
            TestCase {
                // TC2: spans multiple series
                input: vec![vec![(0.0, -2.0)], vec![(10.0, 8.0)]],
                expected: ([0.0, 10.0], [-3.0, 9.0]),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(bounds(&test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_axis_time_uses_unit_format() {
        // 2021-03-01T12:05:00Z
        let millis = 1_614_600_300_000.0;
        assert_eq!(axis_time(millis, TimeFrameUnit::Minute), "12:05");
        assert_eq!(axis_time(millis, TimeFrameUnit::Month), "Mar 2021");
    }
}
