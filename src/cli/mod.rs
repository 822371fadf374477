pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "clinicctl")]
#[command(about = "Operator CLI for the Clinic API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint a signed bearer credential")]
    Token(commands::token::TokenArgs),

    #[command(about = "Show subscription usage from a running server")]
    Usage(commands::usage::UsageArgs),

    #[command(about = "Apply database migrations")]
    Migrate(commands::migrate::MigrateArgs),

    #[command(about = "Subscription package catalog")]
    Packages {
        #[command(subcommand)]
        cmd: commands::packages::PackageCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Token(args) => commands::token::handle(args, output_format).await,
        Commands::Usage(args) => commands::usage::handle(args, output_format).await,
        Commands::Migrate(args) => commands::migrate::handle(args, output_format).await,
        Commands::Packages { cmd } => commands::packages::handle(cmd, output_format).await,
    }
}
