use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::provisioning::report::{render_diagnostics, render_table, to_csv};
use crate::provisioning::{BatchResult, Diagnostic, Identifier};

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(fields)) = data {
                if let Some(obj) = response.as_object_mut() {
                    obj.extend(fields);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Read a whole file, or stdin when `path` is `-`
pub fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("failed to read {}: {}", path, e))
}

/// Failed identifiers of a report saved with `--save`
pub fn failed_from_saved_report(path: &Path) -> anyhow::Result<Vec<Identifier>> {
    let content = std::fs::read_to_string(path)?;
    let report: BatchResult = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{} is not a saved batch report: {}", path.display(), e))?;

    let failed = report.failed_identifiers();
    if failed.is_empty() {
        anyhow::bail!("{} has no failed identifiers to retry", path.display());
    }
    Ok(failed)
}

pub fn join_lines(identifiers: &[Identifier]) -> String {
    identifiers
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Follow-up printed after saving a report that still has failures
pub fn retry_hint(report: &BatchResult, saved_to: &Path) -> Option<String> {
    if report.is_clean() {
        return None;
    }
    Some(format!(
        "{} failed; retry them with `portal provision retry {} <trainees|memberships|users>`",
        report.failed,
        saved_to.display()
    ))
}

/// Print a finished batch and write the optional exports
pub fn output_batch(
    output_format: OutputFormat,
    report: &BatchResult,
    diagnostics: &[Diagnostic],
    save: Option<&Path>,
    csv: Option<&Path>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let output = json!({ "report": report, "diagnostics": diagnostics });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            print!("{}", render_table(report));
            eprint!("{}", render_diagnostics(diagnostics));
        }
    }

    if let Some(path) = save {
        std::fs::write(path, serde_json::to_string_pretty(report)?)?;
        if let Some(hint) = retry_hint(report, path) {
            eprintln!("{}", hint);
        }
    }

    if let Some(path) = csv {
        std::fs::write(path, to_csv(report))?;
    }

    Ok(())
}
