//! Terminal output for surfaced reports.

use console::{StyledObject, style};
use tracing::debug;
use vigil_core::{ErrorReport, Severity};
use vigil_overseer::ReportSink;

/// Prints each report to stdout, coloured by severity.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn deliver(&self, report: &ErrorReport) {
        debug!(file = %report.file, severity = %report.severity, "Report surfaced");
        println!("{}", format_report(report));
    }
}

fn severity_label(severity: Severity) -> StyledObject<String> {
    let label = format!("[{}]", severity.as_str().to_uppercase());
    match severity {
        Severity::High => style(label).red().bold(),
        Severity::Medium => style(label).yellow(),
        Severity::Low => style(label).cyan(),
    }
}

pub fn format_report(report: &ErrorReport) -> String {
    let location = match report.line {
        Some(line) => format!("{}:{}", report.file, line),
        None => report.file.clone(),
    };
    let mut out = format!(
        "{} {} {}",
        severity_label(report.severity),
        style(location).bold(),
        report.description
    );
    if let Some(fix) = report.suggested_fix.as_deref().filter(|f| !f.is_empty()) {
        out.push_str(&format!("\n    {} {}", style("fix:").green(), fix));
    }
    out
}
