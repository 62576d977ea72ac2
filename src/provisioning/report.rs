use std::fmt::Write;

use super::result::{BatchResult, Diagnostic};

/// Human-readable summary followed by one line per identifier
pub fn render_table(result: &BatchResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Total: {}  Successful: {}  Failed: {}  Skipped: {}",
        result.total, result.successful, result.failed, result.skipped
    );

    if result.results.is_empty() {
        return out;
    }

    let width = result
        .results
        .iter()
        .map(|r| r.identifier.as_str().len())
        .max()
        .unwrap_or(0)
        .max("IDENTIFIER".len());

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<width$}  {:<8}  DETAIL", "IDENTIFIER", "STATUS", width = width);
    for row in &result.results {
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {}",
            row.identifier.as_str(),
            row.status.as_str(),
            row.detail.as_deref().unwrap_or(""),
            width = width
        );
    }
    out
}

pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for d in diagnostics {
        let _ = writeln!(out, "warning: {} [{}]: {}", d.identifier, d.step, d.message);
    }
    out
}

/// CSV export of the report rows. Every cell is quoted.
pub fn to_csv(result: &BatchResult) -> String {
    let mut lines = vec![csv_row(&["Identifier", "Status", "Detail"])];
    for row in &result.results {
        lines.push(csv_row(&[
            row.identifier.as_str(),
            row.status.as_str(),
            row.detail.as_deref().unwrap_or(""),
        ]));
    }
    lines.join("\n")
}

fn csv_row(cells: &[&str]) -> String {
    cells
        .iter()
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}
