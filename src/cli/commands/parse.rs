use crate::cli::utils::read_input;
use crate::cli::OutputFormat;
use crate::provisioning::parse_with_report;

pub fn handle(input: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let raw = read_input(input)?;
    let report = parse_with_report(&raw);

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for identifier in &report.identifiers {
                println!("{}", identifier);
            }
            eprintln!(
                "{} valid, {} rejected, {} duplicates",
                report.identifiers.len(),
                report.rejected.len(),
                report.duplicates.len()
            );
            for token in &report.rejected {
                eprintln!("  rejected: {}", token);
            }
        }
    }

    if report.is_empty() {
        anyhow::bail!("no valid identifiers in input");
    }
    Ok(())
}
