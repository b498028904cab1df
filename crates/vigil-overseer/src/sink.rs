//! Destinations for error reports drained from the report file.

use tokio::sync::mpsc;
use tracing::{info, warn};
use vigil_core::{ErrorReport, Severity};

/// Receives every report the overseer surfaces, once each.
pub trait ReportSink: Send + Sync {
    fn deliver(&self, report: &ErrorReport);
}

/// Writes reports to the tracing log. Used when no other sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn deliver(&self, report: &ErrorReport) {
        let location = match report.line {
            Some(line) => format!("{}:{}", report.file, line),
            None => report.file.clone(),
        };
        match report.severity {
            Severity::High | Severity::Medium => warn!(
                target: "vigil::report",
                severity = %report.severity,
                suggested_fix = report.suggested_fix.as_deref().unwrap_or(""),
                "{}: {}",
                location,
                report.description
            ),
            Severity::Low => info!(
                target: "vigil::report",
                severity = %report.severity,
                "{}: {}",
                location,
                report.description
            ),
        }
    }
}

/// Forwards reports into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ErrorReport>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ErrorReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn deliver(&self, report: &ErrorReport) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(report.clone());
    }
}
