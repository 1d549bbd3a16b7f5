//! Rendering of poll cycles: a colored terminal table or JSON lines.
//!
//! Every frame is assembled in memory and written with a single call so a
//! consumer never sees half a table.

use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::time::Duration;
use tracing::warn;

use crate::aggregator::SourceResult;
use crate::arrival::ArrivalRecord;
use crate::config::MonitorConfig;

/// Consumes one cycle's results. Display only; nothing flows back.
pub trait Presenter {
    fn render(
        &mut self,
        timestamp: DateTime<Local>,
        bus: Option<&SourceResult>,
        train: Option<&SourceResult>,
    );
}

const RULE_WIDTH: usize = 75;
const TABLE_WIDTH: usize = 68;
const LOCATION_WIDTH: usize = 28;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// What is being monitored, shown in the banner of every frame.
#[derive(Debug, Clone, Default)]
pub struct MonitorHeader {
    pub stop_id: Option<String>,
    pub bus_route: Option<String>,
    pub station_id: Option<String>,
    pub train_route: Option<String>,
    pub refresh_interval: Duration,
}

impl From<&MonitorConfig> for MonitorHeader {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            stop_id: config.bus.as_ref().map(|b| b.stop_id.clone()),
            bus_route: config.bus.as_ref().and_then(|b| b.route_filter.clone()),
            station_id: config.train.as_ref().map(|t| t.station_id.clone()),
            train_route: config.train.as_ref().and_then(|t| t.route_filter.clone()),
            refresh_interval: config.refresh_interval,
        }
    }
}

pub struct TablePresenter<W> {
    out: W,
    header: MonitorHeader,
    clear_screen: bool,
    live: bool,
}

impl TablePresenter<io::Stdout> {
    pub fn stdout(header: MonitorHeader) -> Self {
        Self::new(io::stdout(), header)
    }
}

impl<W: Write> TablePresenter<W> {
    pub fn new(out: W, header: MonitorHeader) -> Self {
        Self {
            out,
            header,
            clear_screen: false,
            live: false,
        }
    }

    /// Clear the terminal before each frame.
    pub fn clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    /// Show the "Refreshing in" footer used by the live monitor.
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Builds the complete text of one frame.
    pub fn frame(
        &self,
        timestamp: DateTime<Local>,
        bus: Option<&SourceResult>,
        train: Option<&SourceResult>,
    ) -> String {
        let mut buf = String::new();
        if self.clear_screen {
            buf.push_str(CLEAR_SCREEN);
        }
        self.write_banner(&mut buf);

        let _ = writeln!(
            buf,
            "\n{}{}{}",
            "[Last updated: ".cyan(),
            timestamp.format("%Y-%m-%d %H:%M:%S").to_string().bold(),
            "]".cyan()
        );

        if let Some(result) = bus {
            write_section(&mut buf, "Buses", "bus", result, BUS_COLUMNS, bus_row);
        }
        if let Some(result) = train {
            write_section(&mut buf, "Trains", "train", result, TRAIN_COLUMNS, train_row);
        }

        if self.live {
            let _ = writeln!(
                buf,
                "\nRefreshing in {} seconds... (Press Ctrl+C to exit)",
                self.header.refresh_interval.as_secs()
            );
        }
        buf
    }

    fn write_banner(&self, buf: &mut String) {
        let rule = "=".repeat(RULE_WIDTH);
        let _ = writeln!(buf, "{}", rule.cyan());
        let _ = writeln!(
            buf,
            "{}",
            "=== NYC MTA Transit Tracker - Live Monitoring ===".bold().blue()
        );
        let _ = writeln!(buf, "{}", rule.cyan());

        let fields = [
            ("Monitoring stop", &self.header.stop_id),
            ("Route filter", &self.header.bus_route),
            ("Monitoring station", &self.header.station_id),
            ("Train route filter", &self.header.train_route),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                let _ = writeln!(buf, "{} {}", format!("{name}:").green(), value.bold());
            }
        }
        if self.live {
            let _ = writeln!(
                buf,
                "{} {}",
                "Refresh interval:".green(),
                format!("{} seconds", self.header.refresh_interval.as_secs()).bold()
            );
            let _ = writeln!(buf, "\n{}", "Press Ctrl+C to exit".red());
        }
        let _ = writeln!(buf, "{}", rule.cyan());
    }
}

impl<W: Write> Presenter for TablePresenter<W> {
    fn render(
        &mut self,
        timestamp: DateTime<Local>,
        bus: Option<&SourceResult>,
        train: Option<&SourceResult>,
    ) {
        let frame = self.frame(timestamp, bus, train);
        if let Err(e) = self
            .out
            .write_all(frame.as_bytes())
            .and_then(|_| self.out.flush())
        {
            warn!(error = %e, "Failed to write arrivals table");
        }
    }
}

const BUS_COLUMNS: &[(&str, usize)] = &[
    ("Route", 10),
    ("Bus Location", 30),
    ("Arriving In", 15),
    ("Stops Away", 0),
];
const TRAIN_COLUMNS: &[(&str, usize)] = &[("Route", 10), ("Direction", 30), ("Arriving In", 0)];

fn write_section(
    buf: &mut String,
    title: &str,
    noun: &str,
    result: &SourceResult,
    columns: &[(&str, usize)],
    row: fn(&ArrivalRecord) -> String,
) {
    let _ = writeln!(buf, "\n{}", title.bold());

    let records = match result {
        Ok(records) => records,
        Err(e) => {
            let _ = writeln!(buf, "{}", format!("Could not load {noun} arrivals: {e}").red());
            return;
        }
    };
    if records.is_empty() {
        let _ = writeln!(buf, "No upcoming {} found.", title.to_lowercase());
        return;
    }

    let heading: String = columns
        .iter()
        .map(|(name, width)| pad(name, *width))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(buf, "{}", heading.trim_end().bold().cyan());
    let _ = writeln!(buf, "{}", "-".repeat(TABLE_WIDTH).cyan());

    for record in records {
        let _ = writeln!(buf, "{}", row(record));
    }
}

fn bus_row(record: &ArrivalRecord) -> String {
    let location: String = record.location_label.chars().take(LOCATION_WIDTH).collect();
    let stops = record
        .stops_away
        .map_or_else(|| "Unknown".to_string(), |n| n.to_string());
    format!(
        "{} {} {} {}",
        pad(&record.route, 10).yellow(),
        pad(&location, 30),
        arriving_in(record, 15),
        stops.magenta()
    )
}

fn train_row(record: &ArrivalRecord) -> String {
    format!(
        "{} {} {}",
        pad(&record.route, 10).yellow(),
        pad(&record.location_label, 30),
        arriving_in(record, 0)
    )
}

fn pad(text: &str, width: usize) -> String {
    format!("{text:<width$}")
}

/// ETA text colored by urgency: red up to 5 minutes, yellow up to 10.
fn arriving_in(record: &ArrivalRecord, width: usize) -> ColoredString {
    match record.minutes_away() {
        None => pad("Unknown", width).dimmed(),
        Some(0) => pad("Arriving now", width).red().bold(),
        Some(1) => pad("1 minute", width).red(),
        Some(m) if m <= 5 => pad(&format!("{m} minutes"), width).red(),
        Some(m) if m <= 10 => pad(&format!("{m} minutes"), width).yellow(),
        Some(m) => pad(&format!("{m} minutes"), width).green(),
    }
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum SectionReport<'a> {
    #[serde(rename = "ok")]
    Arrivals { arrivals: &'a [ArrivalRecord] },
    #[serde(rename = "error")]
    Failed { error: String },
}

impl<'a> From<&'a SourceResult> for SectionReport<'a> {
    fn from(result: &'a SourceResult) -> Self {
        match result {
            Ok(records) => SectionReport::Arrivals { arrivals: records },
            Err(e) => SectionReport::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Serialize)]
struct CycleReport<'a> {
    timestamp: DateTime<Local>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bus: Option<SectionReport<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    train: Option<SectionReport<'a>>,
}

/// Writes each cycle as one line of JSON.
pub struct JsonPresenter<W> {
    out: W,
}

impl JsonPresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn render(
        &mut self,
        timestamp: DateTime<Local>,
        bus: Option<&SourceResult>,
        train: Option<&SourceResult>,
    ) {
        let report = CycleReport {
            timestamp,
            bus: bus.map(SectionReport::from),
            train: train.map(SectionReport::from),
        };
        let written = serde_json::to_string(&report)
            .map_err(io::Error::from)
            .and_then(|line| writeln!(self.out, "{line}"))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "Failed to write arrivals JSON");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::Direction;
    use crate::error::ArrivalError;

    fn header() -> MonitorHeader {
        MonitorHeader {
            stop_id: Some("MTA_305423".to_string()),
            bus_route: Some("B69".to_string()),
            station_id: Some("R16".to_string()),
            train_route: None,
            refresh_interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_frame_shows_train_rows_and_bus_error() {
        let presenter = TablePresenter::new(Vec::new(), header()).live(true);
        let bus: SourceResult = Err(ArrivalError::transport("connection refused"));
        let train: SourceResult = Ok(vec![ArrivalRecord::train("Q", 240, Direction::Uptown)]);

        let frame = presenter.frame(Local::now(), Some(&bus), Some(&train));

        assert!(frame.contains("Could not load bus arrivals"));
        assert!(frame.contains("connection refused"));
        assert!(frame.contains("Uptown"));
        assert!(frame.contains("4 minutes"));
        assert!(frame.contains("Refreshing in 30 seconds"));
        assert!(frame.contains("MTA_305423"));
    }

    #[test]
    fn test_unconfigured_section_is_omitted() {
        let presenter = TablePresenter::new(Vec::new(), header());
        let bus: SourceResult = Ok(vec![ArrivalRecord::bus("B69", 0, "approaching", Some(0))]);

        let frame = presenter.frame(Local::now(), Some(&bus), None);

        assert!(frame.contains("Buses"));
        assert!(frame.contains("Arriving now"));
        assert!(frame.contains("approaching"));
        assert!(!frame.contains("Trains"));
        assert!(!frame.contains("Refreshing in"));
    }

    #[test]
    fn test_empty_results_message() {
        let presenter = TablePresenter::new(Vec::new(), header());
        let bus: SourceResult = Ok(vec![]);

        let frame = presenter.frame(Local::now(), Some(&bus), None);
        assert!(frame.contains("No upcoming buses found."));
    }

    #[test]
    fn test_long_location_is_truncated() {
        let record = ArrivalRecord::bus("B69", 600, format!("at {}", "X".repeat(40)), Some(4));
        let row = bus_row(&record);
        assert!(row.contains(&format!("at {}", "X".repeat(25))));
        assert!(!row.contains(&"X".repeat(26)));
    }

    #[test]
    fn test_unknown_eta_rendered() {
        let record = ArrivalRecord::bus("B69", ArrivalRecord::UNKNOWN_ETA, "in transit", None);
        let row = bus_row(&record);
        assert!(row.contains("Unknown"));
    }

    #[test]
    fn test_render_writes_whole_frame() {
        let mut presenter = TablePresenter::new(Vec::new(), header()).clear_screen(true);
        let train: SourceResult = Ok(vec![ArrivalRecord::train("N", 61, Direction::Downtown)]);

        presenter.render(Local::now(), None, Some(&train));

        let written = String::from_utf8(presenter.into_inner()).unwrap();
        assert!(written.starts_with(CLEAR_SCREEN));
        assert!(written.contains("1 minute"));
        assert!(written.contains("Downtown"));
    }

    #[test]
    fn test_json_presenter_line() {
        let mut presenter = JsonPresenter::new(Vec::new());
        let bus: SourceResult = Err(ArrivalError::malformed("missing Siri"));
        let train: SourceResult = Ok(vec![ArrivalRecord::train("Q", 30, Direction::Uptown)]);

        presenter.render(Local::now(), Some(&bus), Some(&train));

        let written = String::from_utf8(presenter.into_inner()).unwrap();
        assert_eq!(written.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["bus"]["status"], "error");
        assert_eq!(value["train"]["status"], "ok");
        assert_eq!(value["train"]["arrivals"][0]["route"], "Q");
        assert_eq!(value["train"]["arrivals"][0]["direction"], "Uptown");
        assert_eq!(value["train"]["arrivals"][0]["eta_seconds"], 30);
    }

    #[test]
    fn test_json_presenter_unknown_eta_is_null() {
        let mut presenter = JsonPresenter::new(Vec::new());
        let bus: SourceResult = Ok(vec![ArrivalRecord::bus(
            "B69",
            ArrivalRecord::UNKNOWN_ETA,
            "19 stops away",
            Some(19),
        )]);

        presenter.render(Local::now(), Some(&bus), None);

        let written = String::from_utf8(presenter.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert!(value["bus"]["arrivals"][0]["eta_seconds"].is_null());
        assert_eq!(value["bus"]["arrivals"][0]["stops_away"], 19);
    }
}
