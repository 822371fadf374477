use clap::Args;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use crate::cli::utils::{output_success, require_database_url};
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;

#[derive(Args)]
pub struct MigrateArgs {
    #[arg(long, help = "Database URL override")]
    pub database_url: Option<String>,
}

pub async fn handle(args: MigrateArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = require_database_url(args.database_url)?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&url)
        .await?;

    DatabaseManager::migrate(&pool).await?;
    output_success(
        output_format,
        &format!("Migrations applied to {}", DatabaseManager::redacted_url(&url)?),
        None,
    )
}
