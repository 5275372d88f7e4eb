//! Triage Atlas CLI
//!
//! Command-line interface for the Triage Atlas incident triage service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;
mod config;

use commands::{run_server, ServeConfig};
use config::{AppConfig, DEFAULT_DATABASE_URL};
use ta_client::{AnalysisOutcome, AnalysisRunner, ApiClient};
use ta_core::{StepStatus, TokenUsage};
use ta_observability::{init_logging_with_config, LoggingConfig};

#[derive(Parser)]
#[command(name = "triage-atlas")]
#[command(version)]
#[command(about = "Security-incident triage: search, categorization, recommendations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// API server URL (for remote commands)
    #[arg(long, default_value = "http://localhost:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Database URL for the result store
        #[arg(short, long, default_value = DEFAULT_DATABASE_URL)]
        database: String,

        /// Disable Swagger UI
        #[arg(long)]
        no_swagger: bool,

        /// Use scripted mock engines instead of the model provider
        #[arg(long)]
        offline: bool,
    },

    /// Import a text file of incidents (separated by ### or --- lines)
    Import {
        /// File to import
        file: PathBuf,

        /// Source label recorded on the created incidents
        #[arg(long)]
        source: Option<String>,
    },

    /// Search incidents semantically
    Search {
        /// Query text
        query: String,

        /// Maximum results
        #[arg(long, default_value = "5")]
        top_k: usize,
    },

    /// Run a full analysis: categorize under all taxonomies and recommend
    Analyze {
        /// Number of incidents to analyze
        #[arg(short, long, default_value = "100")]
        count: usize,

        /// Identity used to persist the results; omitted runs are not saved
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        init_logging_with_config(LoggingConfig::development());
    } else {
        init_logging_with_config(LoggingConfig::default());
    }

    match cli.command {
        Commands::Serve {
            port,
            host,
            database,
            no_swagger,
            offline,
        } => {
            run_server(
                ServeConfig {
                    host,
                    port,
                    database_url: database,
                    enable_swagger: !no_swagger,
                    offline,
                },
                AppConfig::from_env(),
            )
            .await
        }

        Commands::Import { file, source } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let source = source.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "file-upload".to_string())
            });

            let client = ApiClient::new(&cli.api_url)?;
            let outcome = client.import_text(&content, &source).await?;
            println!("{}", "Import finished".green().bold());
            println!(
                "  processed: {}  duplicates: {}  errors: {}",
                outcome["processed"], outcome["duplicates"], outcome["errors"]
            );
            Ok(())
        }

        Commands::Search { query, top_k } => {
            let client = ApiClient::new(&cli.api_url)?;
            let results = client.search(&query, top_k).await?;
            if results.is_empty() {
                println!("{}", "No matching incidents".yellow());
                return Ok(());
            }
            for result in results {
                println!(
                    "{} {} {}",
                    format!("[{:.3}]", result.score).cyan(),
                    result.incident.id.bold(),
                    truncate(&result.incident.content, 100)
                );
            }
            Ok(())
        }

        Commands::Analyze { count, email } => {
            let mut client = ApiClient::new(&cli.api_url)?;
            if let Some(email) = &email {
                client = client.with_user_email(email.clone());
            }

            let runner = Arc::new(AnalysisRunner::new(Arc::new(client), email));
            let mut run = {
                let runner = Arc::clone(&runner);
                tokio::spawn(async move { runner.start(count).await })
            };

            let outcome = tokio::select! {
                result = &mut run => result.context("analysis task failed")??,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("{}", "Cancelling analysis...".yellow());
                    runner.cancel();
                    run.await.context("analysis task failed")??
                }
            };

            report_outcome(&outcome);
            Ok(())
        }
    }
}

fn report_outcome(outcome: &AnalysisOutcome) {
    if outcome.cancelled {
        println!("{}", "Analysis cancelled; nothing was persisted".yellow());
    }

    for step in &outcome.steps {
        let status = match step.status {
            StepStatus::Completed => "completed".green(),
            StepStatus::Error => "error".red(),
            StepStatus::Processing => "processing".yellow(),
            StepStatus::Pending => "pending".dimmed(),
        };
        println!("  {:<35} {}", step.name, status);
    }

    println!(
        "{} incidents analyzed, {} with recommendations",
        outcome.results.len(),
        outcome
            .results
            .iter()
            .filter(|r| r.recommendation.is_some())
            .count()
    );

    let mut tokens = TokenUsage::default();
    for usage in [
        outcome.categorization_tokens.cert,
        outcome.categorization_tokens.llm,
        outcome.categorization_tokens.nist,
    ]
    .into_iter()
    .flatten()
    {
        tokens.accumulate(&usage);
    }
    println!("categorization tokens: {}", tokens.total_tokens);

    match (&outcome.saved_id, &outcome.persistence_error) {
        (Some(id), _) => println!("{} {}", "saved as".green(), id.bold()),
        (None, Some(error)) => println!("{} {}", "save failed:".red(), error),
        (None, None) => {}
    }
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let prefix: String = flat.chars().take(max).collect();
    format!("{}…", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_serve_defaults() {
        let cli = Cli::parse_from(["triage-atlas", "serve"]);
        match cli.command {
            Commands::Serve { port, offline, .. } => {
                assert_eq!(port, 8080);
                assert!(!offline);
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_cli_parses_analyze_count() {
        let cli = Cli::parse_from(["triage-atlas", "analyze", "--count", "25"]);
        match cli.command {
            Commands::Analyze { count, email } => {
                assert_eq!(count, 25);
                assert!(email.is_none());
            }
            _ => panic!("expected analyze command"),
        }
    }

    #[test]
    fn test_truncate_preserves_short_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a\nb", 10), "a b");
        assert!(truncate(&"x".repeat(200), 100).chars().count() <= 101);
    }
}
