use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::client::ApiClient;
use crate::cli::config::{self, ServerInfo, ServerStatus};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Point the CLI at a provisioning server")]
    Set {
        #[arg(help = "Server URL, e.g. https://portal.example.com")]
        url: String,
        #[arg(long, help = "Admin JWT sent with provisioning requests")]
        token: Option<String>,
    },

    #[command(about = "Show the configured server")]
    Show,

    #[command(about = "Check server liveness via /health")]
    Ping,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Set { url, token } => {
            url::Url::parse(&url)
                .map_err(|e| anyhow::anyhow!("invalid server URL '{}': {}", url, e))?;

            let server = ServerInfo::new(url, token);
            config::save_server_config(&server)?;
            output_success(
                output_format,
                &format!("Server set to {}", server.url),
                Some(json!({ "url": server.url, "has_token": server.token.is_some() })),
            )
        }

        ServerCommands::Show => {
            let server = config::require_server()?;
            match output_format {
                OutputFormat::Json => {
                    let mut value = serde_json::to_value(&server)?;
                    if let Some(obj) = value.as_object_mut() {
                        // Never echo the token itself
                        obj.insert("token".to_string(), json!(server.token.is_some()));
                    }
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                OutputFormat::Text => {
                    println!("URL:       {}", server.url);
                    let token = if server.token.is_some() { "set" } else { "not set" };
                    println!("Token:     {}", token);
                    println!("Status:    {:?}", server.status);
                    if let Some(last_ping) = server.last_ping {
                        println!("Last ping: {}", last_ping.to_rfc3339());
                    }
                }
            }
            Ok(())
        }

        ServerCommands::Ping => {
            let mut server = config::require_server()?;
            let status = config::ping_server(&server).await;
            server.update_ping(status);
            config::save_server_config(&server)?;

            if status != ServerStatus::Up {
                anyhow::bail!("{} is not responding", server.url);
            }

            let health: Value = ApiClient::new(&server).get("/health").await?;
            let database = health.get("database").and_then(Value::as_str).unwrap_or("unknown");
            output_success(
                output_format,
                &format!("{} is up (database: {})", server.url, database),
                Some(json!({ "health": health })),
            )
        }
    }
}
