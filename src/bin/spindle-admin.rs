use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spindle::config::{Config, DatabaseBackend};
use spindle::models::{CreateOrganisationRequest, MetricRecord};
use spindle::reporting::catalog;
use spindle::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "spindle-admin")]
#[command(about = "Spindle database administration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the organisation and metric tables if they are missing
    Init,
    /// Register an organisation
    CreateOrg {
        /// External organisation id, e.g. UNI0024
        organisation_id: String,
        /// Display name
        name: String,
        #[arg(long)]
        address: Option<String>,
    },
    /// List registered organisations
    ListOrgs {
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Load metric records from a JSON array file
    Import {
        /// Metric table name, e.g. yarn_realisation
        #[arg(long)]
        table: String,
        /// Organisation id the records belong to
        #[arg(long)]
        org: String,
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Init => {
            println!("✓ Database schema is up to date");
        }
        Commands::CreateOrg {
            organisation_id,
            name,
            address,
        } => {
            let request = CreateOrganisationRequest {
                organisation_id,
                name,
                address,
            };
            match storage.create_organisation(&request).await {
                Ok(organisation) => println!(
                    "✓ Created organisation '{}' ({})",
                    organisation.organisation_id, organisation.name
                ),
                Err(StorageError::Conflict) => println!(
                    "⚠ Organisation '{}' already exists",
                    request.organisation_id
                ),
                Err(StorageError::Other(e)) => return Err(e),
            }
        }
        Commands::ListOrgs { limit } => {
            let organisations = storage.list_organisations(limit, 0).await?;
            if organisations.is_empty() {
                println!("No organisations found.");
            } else {
                println!("{:<16} {:<32} {:<8}", "ID", "Name", "Active");
                println!("{}", "-".repeat(60));
                for organisation in organisations {
                    println!(
                        "{:<16} {:<32} {:<8}",
                        organisation.organisation_id, organisation.name, organisation.is_active
                    );
                }
            }
        }
        Commands::Import { table, org, file } => {
            let table = catalog::table(&table)?;
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records: Vec<MetricRecord> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            let prepared = records
                .iter()
                .map(|record| record.prepare(table))
                .collect::<Result<Vec<_>, _>>()?;
            let inserted = storage
                .insert_metric_records(&org, table, &prepared)
                .await?;
            println!("✓ Imported {} records into {} for '{}'", inserted, table.name, org);
        }
    }

    Ok(())
}
