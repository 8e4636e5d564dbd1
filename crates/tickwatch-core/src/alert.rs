//! Alert rendering and delivery seam.
//!
//! [`AlertReport`] renders a cycle's violations (or a full summary of the
//! watchlist) as plain text. [`Notifier`] implementations deliver it. A
//! delivery failure is a [`NotifyError`], never a fetch failure.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::batch::BatchReport;
use crate::watchlist::Watchlist;
use crate::{NotifyError, ThresholdKind, Violation};

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Thresholds crossed during one cycle.
    Alert,
    /// Every tracked symbol with its price and bounds.
    Summary,
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertReport {
    pub kind: ReportKind,
    pub subject: String,
    pub body: String,
    /// Violations for alerts, symbols for summaries.
    pub items: usize,
}

impl AlertReport {
    /// Alert for `violations`; `None` when there is nothing to report.
    pub fn from_violations(violations: &[Violation]) -> Option<Self> {
        if violations.is_empty() {
            return None;
        }

        let mut body = header("Stock Threshold Alert");
        for violation in violations {
            push_identity(&mut body, violation.name.as_deref(), violation.symbol.as_str());
            body.push_str(&format!(
                "Current Price: {}\n",
                amount(violation.price, &violation.currency)
            ));
            body.push_str(&format!(
                "Threshold ({}): {}\n",
                violation.kind,
                amount(violation.threshold, &violation.currency)
            ));
            body.push_str(&format!("Status: {}\n", violation.message));
            push_separator(&mut body);
        }
        body.push_str("\nThis is an automated alert from tickwatch.\n");

        Some(Self {
            kind: ReportKind::Alert,
            subject: format!("Stock Alert: {} Threshold(s) Crossed", violations.len()),
            body,
            items: violations.len(),
        })
    }

    /// Summary of every valid watchlist entry for one cycle. Symbols whose
    /// fetch failed are listed with no price and no status.
    pub fn summary(watchlist: &Watchlist, report: &BatchReport) -> Option<Self> {
        if watchlist.entries.is_empty() {
            return None;
        }

        let mut body = header("Stock Price Summary - Daily Report");
        body.push_str(&format!("As of: {}\n\n", report.finished_at.to_report_string()));
        for entry in &watchlist.entries {
            push_identity(&mut body, entry.name.as_deref(), entry.symbol.as_str());

            let quote = report
                .quotes
                .iter()
                .map(|success| &success.quote)
                .find(|quote| quote.symbol == entry.symbol);
            let currency = quote.map_or("", |quote| quote.currency.as_str());

            match quote {
                Some(quote) => body.push_str(&format!(
                    "Current Price: {}\n",
                    amount(quote.price, currency)
                )),
                None => body.push_str("Current Price: N/A\n"),
            }
            push_bound(&mut body, "Upper", entry.spec.upper(), currency);
            push_bound(&mut body, "Lower", entry.spec.lower(), currency);

            if quote.is_some() {
                let status = report
                    .violations
                    .iter()
                    .find(|violation| violation.symbol == entry.symbol)
                    .map_or("OK", |violation| match violation.kind {
                        ThresholdKind::AboveUpper => "ALERT - Above upper threshold",
                        ThresholdKind::BelowLower => "ALERT - Below lower threshold",
                    });
                body.push_str(&format!("Status: {status}\n"));
            }
            push_separator(&mut body);
        }
        body.push_str("\nThis is an automated daily summary from tickwatch.\n");

        Some(Self {
            kind: ReportKind::Summary,
            subject: String::from("Stock Price Summary - Daily Report"),
            body,
            items: watchlist.entries.len(),
        })
    }
}

fn header(title: &str) -> String {
    format!("{title}\n{}\n\n", "=".repeat(RULE_WIDTH))
}

fn push_identity(body: &mut String, name: Option<&str>, symbol: &str) {
    if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
        body.push_str(&format!("Stock: {name}\n"));
    }
    body.push_str(&format!("Symbol: {symbol}\n"));
}

fn push_bound(body: &mut String, label: &str, bound: Option<Decimal>, currency: &str) {
    match bound {
        Some(value) => body.push_str(&format!("{label} Threshold: {}\n", amount(value, currency))),
        None => body.push_str(&format!("{label} Threshold: Not set\n")),
    }
}

fn push_separator(body: &mut String) {
    body.push_str(&"-".repeat(RULE_WIDTH));
    body.push_str("\n\n");
}

fn amount(value: Decimal, currency: &str) -> String {
    let value = format!("{:.4}", value.round_dp(4));
    if currency.is_empty() {
        value
    } else {
        format!("{value} {currency}")
    }
}

/// Delivery channel for rendered reports.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn notify(&self, report: &AlertReport) -> Result<(), NotifyError>;
}

/// Writes reports to the tracing output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&self, report: &AlertReport) -> Result<(), NotifyError> {
        match report.kind {
            ReportKind::Alert => {
                tracing::warn!(subject = %report.subject, items = report.items, "\n{}", report.body)
            }
            ReportKind::Summary => {
                tracing::info!(subject = %report.subject, items = report.items, "\n{}", report.body)
            }
        }
        Ok(())
    }
}

/// Drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn name(&self) -> &'static str {
        "null"
    }

    fn notify(&self, _report: &AlertReport) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Appends each report to a text file, mailbox style.
#[derive(Debug, Clone)]
pub struct FileNotifier {
    path: PathBuf,
}

impl FileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Notifier for FileNotifier {
    fn name(&self) -> &'static str {
        "file"
    }

    fn notify(&self, report: &AlertReport) -> Result<(), NotifyError> {
        let io_error = |source| NotifyError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        write!(file, "Subject: {}\n\n{}\n", report.subject, report.body).map_err(io_error)?;

        tracing::info!(path = %self.path.display(), subject = %report.subject, "alert written");
        Ok(())
    }
}

/// Broadcasts reports to every registered notifier.
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver to all notifiers; one failing does not stop the rest. The
    /// first error is returned.
    pub fn notify_all(&self, report: &AlertReport) -> Result<(), NotifyError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(error) = notifier.notify(report) {
                tracing::error!(notifier = notifier.name(), error = %error, "alert delivery failed");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
