pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pacelab",
    about = "Strava Running History Analysis & Pace Forecast"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Exchange a Strava authorization code for tokens
    Auth {
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Download recent activities and write the cleaned dataset
    Fetch {
        #[arg(long)]
        lookback: Option<u32>,
    },
    /// Classify, aggregate and report on the cleaned dataset
    Analyze {
        #[arg(long, default_value_t = false)]
        no_ai: bool,
    },
    /// Fit the pace model and predict next week's pace
    Forecast {
        #[arg(long)]
        holdout: Option<String>,
    },
    /// Fetch, analyze and forecast in one pass
    Run {
        #[arg(long, default_value_t = false)]
        no_ai: bool,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Doctor,
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}
