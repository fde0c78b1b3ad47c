//! Terminal output: colored status lines, a progress spinner for the fetch
//! loop, and the end-of-run summary table.

use comfy_table::{Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::resolve::{KeyReport, KeyStatus, MergeObserver, MergeReport};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Pending,
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Pending => "○",
    }
}

/// A message prefixed with its colored status icon
pub fn status_line(status: Status, msg: &str) -> String {
    let icon = status_icon(status);
    match status {
        Status::Success => format!("{} {}", icon.green().bold(), msg),
        Status::Error => format!("{} {}", icon.red().bold(), msg),
        Status::Warning => format!("{} {}", icon.yellow().bold(), msg),
        Status::Info => format!("{} {}", icon.cyan().bold(), msg),
        Status::Pending => format!("{} {}", icon.white().dimmed(), msg),
    }
}

/// Print a styled status message.
pub fn print_status(status: Status, msg: &str) {
    println!("{}", status_line(status, msg));
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// How a key's outcome is shown: icon and one-line detail
pub fn describe_status(status: &KeyStatus) -> (Status, String) {
    match status {
        KeyStatus::Existing => (Status::Pending, "already in bibliography".to_string()),
        KeyStatus::Fetched { route, .. } => (Status::Success, route.clone()),
        KeyStatus::Duplicate { of, matched_by } => (
            Status::Warning,
            format!("same {} as {}, added crossref", matched_by, of),
        ),
        KeyStatus::NotFound => (Status::Error, "not found".to_string()),
        KeyStatus::TransientError { reasons } => (Status::Error, reasons.join("; ")),
        KeyStatus::Skipped { reason } => (Status::Info, reason.clone()),
    }
}

/// Per-key progress for the fetch loop.
///
/// Shows a spinner while a key is being resolved (only when stdout is a
/// terminal) and prints one status line per key that was looked up.
pub struct Spinner {
    pb: Option<indicatif::ProgressBar>,
    quiet: bool,
}

impl Spinner {
    /// Create a new spinner; `quiet` suppresses all output.
    pub fn new(quiet: bool) -> Self {
        let pb = (!quiet && is_terminal()).then(|| {
            let pb = indicatif::ProgressBar::new_spinner();
            let style = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");
            pb.set_style(style);
            pb
        });
        Self { pb, quiet }
    }

    fn println(&self, line: String) {
        match self.pb {
            Some(ref pb) => pb.println(line),
            None => println!("{}", line),
        }
    }

    /// Finish the spinner.
    pub fn finish(&self) {
        if let Some(ref pb) = self.pb {
            pb.finish_and_clear();
        }
    }
}

impl MergeObserver for Spinner {
    fn on_start(&self, key: &str) {
        if let Some(ref pb) = self.pb {
            pb.set_message(format!("Fetching {}...", key));
            pb.enable_steady_tick(Duration::from_millis(100));
        }
    }

    fn on_finish(&self, report: &KeyReport) {
        if self.quiet || report.status == KeyStatus::Existing {
            return;
        }
        let (status, detail) = describe_status(&report.status);
        self.println(status_line(status, &format!("{} {}", report.key.bold(), detail.dimmed())));
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Summary table of every key that did not end up as a fresh fetch.
///
/// Returns `None` when there is nothing to show.
pub fn problem_table(report: &MergeReport) -> Option<Table> {
    let rows: Vec<&KeyReport> = report
        .keys
        .iter()
        .filter(|r| {
            !matches!(r.status, KeyStatus::Existing | KeyStatus::Fetched { .. })
        })
        .collect();
    if rows.is_empty() {
        return None;
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Key", "Outcome", "Detail"]);

    for row in rows {
        let (status, detail) = describe_status(&row.status);
        let (label, color) = match row.status {
            KeyStatus::NotFound => ("not found", Color::Red),
            KeyStatus::TransientError { .. } => ("failed", Color::Red),
            KeyStatus::Duplicate { .. } => ("duplicate", Color::Yellow),
            _ => ("skipped", Color::Cyan),
        };
        table.add_row(vec![
            Cell::new(&row.key).add_attribute(Attribute::Bold),
            Cell::new(format!("{} {}", status_icon(status), label)).fg(color),
            Cell::new(detail),
        ]);
    }
    Some(table)
}

/// One-line totals for the end of a run
pub fn summary_line(report: &MergeReport) -> String {
    let mut parts = vec![format!("{} new", report.fetched_count())];
    if report.existing_count() > 0 {
        parts.push(format!("{} already present", report.existing_count()));
    }
    if report.duplicate_count() > 0 {
        parts.push(format!("{} duplicate", report.duplicate_count()));
    }
    if report.skipped_count() > 0 {
        parts.push(format!("{} skipped", report.skipped_count()));
    }
    let unresolved = report.unresolved().len();
    if unresolved > 0 {
        parts.push(format!("{} unresolved", unresolved));
    }
    parts.join(", ")
}
