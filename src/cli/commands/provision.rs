use clap::{Args, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::client::ApiClient;
use crate::cli::config;
use crate::cli::utils::{failed_from_saved_report, join_lines, output_batch, read_input};
use crate::cli::OutputFormat;
use crate::handlers::provision::payload::ProvisionResponse;
use crate::provisioning::{parse_user_csv, Certification, Identifier, MembershipTier, UserRow};

#[derive(Subcommand)]
pub enum ProvisionCommands {
    #[command(about = "Create accounts for the trainees of a training batch")]
    Trainees {
        #[arg(help = "Training batch id")]
        batch_id: Uuid,
        #[arg(help = "Email list file, or '-' for stdin; omit to provision every pending trainee")]
        input: Option<String>,
        #[arg(
            long = "trainee-id",
            value_name = "UUID",
            conflicts_with = "input",
            help = "Only these pending trainees (repeatable)"
        )]
        trainee_ids: Vec<Uuid>,
        #[command(flatten)]
        options: TraineeOptions,
        #[command(flatten)]
        export: ExportArgs,
    },

    #[command(about = "Activate a membership tier for existing accounts")]
    Memberships {
        #[arg(help = "Email list file, or '-' for stdin")]
        input: String,
        #[command(flatten)]
        options: MembershipOptions,
        #[command(flatten)]
        export: ExportArgs,
    },

    #[command(about = "Create standalone accounts from a CSV of user rows")]
    Users {
        #[arg(help = "CSV file with email and full_name columns, or '-' for stdin")]
        input: String,
        #[command(flatten)]
        options: UserOptions,
        #[command(flatten)]
        export: ExportArgs,
    },

    #[command(about = "Re-submit only the failed identifiers of a saved report")]
    Retry {
        #[arg(help = "Report written earlier with --save")]
        report: PathBuf,
        #[command(subcommand)]
        target: RetryTarget,
    },
}

#[derive(Subcommand)]
pub enum RetryTarget {
    Trainees {
        batch_id: Uuid,
        #[command(flatten)]
        options: TraineeOptions,
        #[command(flatten)]
        export: ExportArgs,
    },
    Memberships {
        #[command(flatten)]
        options: MembershipOptions,
        #[command(flatten)]
        export: ExportArgs,
    },
    Users {
        #[arg(help = "The CSV submitted originally; only failed rows are sent again")]
        input: String,
        #[command(flatten)]
        options: UserOptions,
        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TraineeOptions {
    #[arg(long, value_name = "TIER", help = "Also activate a membership (basic or professional)")]
    pub activate_membership: Option<MembershipTier>,
    #[arg(long, help = "Also grant curriculum access")]
    pub grant_curriculum: bool,
    #[arg(long, help = "Force one track (CP or SCP) instead of each trainee's own")]
    pub certification: Option<Certification>,
    #[arg(long, help = "Curriculum language, defaults to en on the server")]
    pub language: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct MembershipOptions {
    #[arg(long, help = "Membership tier (basic or professional)")]
    pub tier: MembershipTier,
    #[arg(long, help = "Membership length in months")]
    pub months: Option<u32>,
    #[arg(long, help = "Note stored with each activation")]
    pub notes: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UserOptions {
    #[arg(long, help = "Grant curriculum access for rows with a certification track")]
    pub activate_content: bool,
    #[arg(long, help = "Curriculum access length in months")]
    pub months: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    #[arg(long, value_name = "PATH", help = "Save the JSON report for a later retry")]
    pub save: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Write the report as CSV")]
    pub csv: Option<PathBuf>,
}

impl TraineeOptions {
    fn body(&self, emails: Option<String>, trainee_ids: &[Uuid]) -> Value {
        let mut body = json!({
            "activate_membership": self.activate_membership.is_some(),
            "membership_type": self.activate_membership,
            "grant_curriculum_access": self.grant_curriculum,
            "certification": self.certification,
            "language": self.language,
        });
        if let Some(emails) = emails {
            body["emails"] = json!(emails);
        }
        if !trainee_ids.is_empty() {
            body["trainee_ids"] = json!(trainee_ids);
        }
        body
    }
}

impl MembershipOptions {
    fn body(&self, emails: String) -> Value {
        json!({
            "emails": emails,
            "membership_type": self.tier,
            "duration_months": self.months,
            "notes": self.notes,
        })
    }
}

impl UserOptions {
    fn body(&self, users: &[UserRow]) -> Value {
        json!({
            "users": users,
            "activate_content": self.activate_content,
            "duration_months": self.months,
        })
    }
}

/// Rows whose email is among `failed`, in file order
fn failed_rows(rows: Vec<UserRow>, failed: &[Identifier]) -> Vec<UserRow> {
    rows.into_iter()
        .filter(|row| {
            Identifier::parse(&row.email).is_some_and(|identifier| failed.contains(&identifier))
        })
        .collect()
}

fn read_user_rows(input: &str) -> anyhow::Result<Vec<UserRow>> {
    let rows = parse_user_csv(&read_input(input)?);
    if rows.is_empty() {
        anyhow::bail!("{} has no user rows", input);
    }
    Ok(rows)
}

pub async fn handle(cmd: ProvisionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ProvisionCommands::Trainees { batch_id, input, trainee_ids, options, export } => {
            let emails = input.as_deref().map(read_input).transpose()?;
            let body = options.body(emails, &trainee_ids);
            trainees(batch_id, body, &export, output_format).await
        }
        ProvisionCommands::Memberships { input, options, export } => {
            let emails = read_input(&input)?;
            memberships(emails, &options, &export, output_format).await
        }
        ProvisionCommands::Users { input, options, export } => {
            let rows = read_user_rows(&input)?;
            users(&rows, &options, &export, output_format).await
        }
        ProvisionCommands::Retry { report, target } => {
            let failed = failed_from_saved_report(&report)?;
            match target {
                RetryTarget::Trainees { batch_id, options, export } => {
                    let body = options.body(Some(join_lines(&failed)), &[]);
                    trainees(batch_id, body, &export, output_format).await
                }
                RetryTarget::Memberships { options, export } => {
                    memberships(join_lines(&failed), &options, &export, output_format).await
                }
                RetryTarget::Users { input, options, export } => {
                    let rows = failed_rows(read_user_rows(&input)?, &failed);
                    if rows.is_empty() {
                        anyhow::bail!("none of the failed identifiers appear in {}", input);
                    }
                    users(&rows, &options, &export, output_format).await
                }
            }
        }
    }
}

async fn trainees(
    batch_id: Uuid,
    body: Value,
    export: &ExportArgs,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let path = format!("/api/provision/trainees/{}", batch_id);
    submit(&path, body, export, output_format).await
}

async fn memberships(
    emails: String,
    options: &MembershipOptions,
    export: &ExportArgs,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    submit("/api/provision/memberships", options.body(emails), export, output_format).await
}

async fn users(
    rows: &[UserRow],
    options: &UserOptions,
    export: &ExportArgs,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    submit("/api/provision/users", options.body(rows), export, output_format).await
}

async fn submit(
    path: &str,
    body: Value,
    export: &ExportArgs,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let server = config::require_server()?;
    let client = ApiClient::new(&server);

    tracing::debug!("POST {}{}", server.url, path);
    let response: ProvisionResponse = client.post(path, &body).await?;
    tracing::info!("Batch finished in {}ms", response.elapsed_ms);

    output_batch(
        output_format,
        &response.report,
        &response.diagnostics,
        export.save.as_deref(),
        export.csv.as_deref(),
    )
}
