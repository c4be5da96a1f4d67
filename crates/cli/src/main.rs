//! Aqua Sentinel CLI
//!
//! A command-line tool for assessing pond water quality, either through a
//! running aqua-sentinel service or offline against local models.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{assess, health, predict, species};
use std::path::PathBuf;

/// Aqua Sentinel CLI
#[derive(Parser)]
#[command(name = "aqs")]
#[command(author, version, about = "CLI for Aqua Sentinel pond water-quality forecasting", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via AQS_API_URL env var)
    #[arg(long, env = "AQS_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Forecast and assess a pond through the sentinel service
    Predict {
        /// JSON file with sensor points, or a full request with species and history
        #[arg(long)]
        history: PathBuf,

        /// Species id (overrides the file; unknown ids use the most sensitive profile)
        #[arg(long, short)]
        species: Option<String>,
    },

    /// Forecast and assess a pond locally, without the service
    Assess {
        /// JSON file with sensor points, or a full request with species and history
        #[arg(long)]
        history: PathBuf,

        /// Model directory
        #[arg(long, default_value = "./models")]
        models: PathBuf,

        /// TOML/JSON file with extra species profiles
        #[arg(long)]
        thresholds: Option<PathBuf>,

        /// Species id (overrides the file)
        #[arg(long, short)]
        species: Option<String>,
    },

    /// List species threshold profiles
    Species,

    /// Show service health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Predict { history, species } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::predict(&client, &history, species, cli.format).await?;
        }
        Commands::Assess {
            history,
            models,
            thresholds,
            species,
        } => {
            assess::assess(&history, &models, thresholds.as_deref(), species, cli.format)?;
        }
        Commands::Species => {
            let client = client::ApiClient::new(&cli.api_url)?;
            species::list_species(&client, cli.format).await?;
        }
        Commands::Health => {
            let client = client::ApiClient::new(&cli.api_url)?;
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
