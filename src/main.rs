//! # Invoicing API Main Entry Point
//!
//! `invoicing serve` (the default) runs the HTTP API, `invoicing migrate`
//! applies pending schema migrations and `invoicing seed` loads the demo
//! tenant.

use anyhow::Context;
use clap::{Parser, Subcommand};
use invoicing::{
    config::ConfigLoader,
    db,
    seeds::{self, DemoSeed},
    server::run_server,
    telemetry,
};

#[derive(Parser, Debug)]
#[command(name = "invoicing", about = "Multi-tenant invoicing API", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Apply pending migrations before accepting requests
        #[arg(long)]
        migrate: bool,
    },
    /// Apply pending schema migrations and exit
    Migrate,
    /// Migrate, then create the demo tenant with sample customers, products and invoices
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command.unwrap_or(Command::Serve { migrate: false }) {
        Command::Serve { migrate } => {
            if migrate {
                db::run_migrations(&db).await?;
            }
            run_server(config, db).await
        }
        Command::Migrate => db::run_migrations(&db).await,
        Command::Seed => {
            db::run_migrations(&db).await?;
            match seeds::seed_demo(&db).await? {
                DemoSeed::Created { tenant_id } => tracing::info!(
                    %tenant_id,
                    email = seeds::DEMO_ADMIN_EMAIL,
                    password = seeds::DEMO_ADMIN_PASSWORD,
                    "Demo data created"
                ),
                DemoSeed::AlreadyPresent { tenant_id } => {
                    tracing::info!(%tenant_id, "Demo data already present")
                }
            }
            Ok(())
        }
    }
}
