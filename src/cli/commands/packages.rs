use clap::Subcommand;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;

use crate::cli::utils::{output_success, output_value, require_database_url};
use crate::cli::OutputFormat;
use crate::database::catalog;
use crate::database::models::SubscriptionPackage;
use crate::store::postgres::PgStore;
use crate::store::SubscriptionStore;

#[derive(Subcommand)]
pub enum PackageCommands {
    #[command(about = "Load packages from a YAML catalog into the database")]
    Import {
        #[arg(help = "Catalog file (see fixtures/packages.yaml)")]
        file: PathBuf,
        #[arg(long, help = "Database URL override")]
        database_url: Option<String>,
    },

    #[command(about = "List packages in the database, or the bundled catalog with --bundled")]
    List {
        #[arg(long, help = "Show the catalog compiled into the binary")]
        bundled: bool,
        #[arg(long, help = "Database URL override")]
        database_url: Option<String>,
    },
}

pub async fn handle(cmd: PackageCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PackageCommands::Import { file, database_url } => handle_import(file, database_url, output_format).await,
        PackageCommands::List { bundled, database_url } => handle_list(bundled, database_url, output_format).await,
    }
}

async fn connect(database_url: Option<String>) -> anyhow::Result<PgStore> {
    let url = require_database_url(database_url)?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await?;
    Ok(PgStore::new(pool))
}

async fn handle_import(file: PathBuf, database_url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let packages = catalog::load_catalog(&file)?;
    let store = connect(database_url).await?;

    let mut imported = Vec::new();
    for package in &packages {
        let id = store.import_package(package).await?;
        tracing::debug!("Imported package {} as {}", package.name, id);
        imported.push(json!({ "id": id, "name": package.name }));
    }

    output_success(
        output_format,
        &format!("Imported {} package(s) from {}", packages.len(), file.display()),
        Some(json!({ "packages": imported })),
    )
}

async fn handle_list(bundled: bool, database_url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let packages = if bundled {
        catalog::default_catalog()?
    } else {
        connect(database_url).await?.list_packages().await?
    };

    let value = serde_json::to_value(&packages)?;
    output_value(output_format, &value, |_| render_packages(&packages))
}

fn render_packages(packages: &[SubscriptionPackage]) {
    if packages.is_empty() {
        println!("No packages");
        return;
    }
    for package in packages {
        println!("{}  {}  {} days", package.name, package.price, package.duration_days);
        for limit in &package.limits {
            println!("    {:<14} {}", limit.resource_type.as_str(), limit.limit_value);
        }
    }
}

