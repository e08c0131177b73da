use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod db;
mod error;
mod filter;
mod format;
mod models;
mod month;
mod report;
mod series;
mod stats;
mod store;
#[cfg(test)]
mod test_utils;
mod web;

use filter::ListParams;

#[derive(Parser)]
#[command(name = "customer-metrics-report")]
#[command(about = "Monthly recruiting customer metrics with trend reporting", long_about = None)]
struct Cli {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[arg(long, env = "MAX_PG_CONNECTIONS", default_value_t = 5)]
    max_pg_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample customer records
    Seed,
    /// Import customer records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filters: ReportFilters,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
}

#[derive(Args)]
struct ReportFilters {
    /// Substring of the recruitment method
    #[arg(long)]
    method: Option<String>,
    /// Substring of the customer name
    #[arg(long)]
    customer: Option<String>,
    /// First month to include, YYYY-MM
    #[arg(long)]
    start: Option<String>,
    /// Last month to include, YYYY-MM
    #[arg(long)]
    end: Option<String>,
    #[arg(long)]
    sort: Option<String>,
    /// asc or desc
    #[arg(long)]
    order: Option<String>,
}

impl From<ReportFilters> for ListParams {
    fn from(filters: ReportFilters) -> Self {
        ListParams {
            recruitment_method: filters.method,
            customer_name: filters.customer,
            start_date: filters.start,
            end_date: filters.end,
            sort: filters.sort,
            order: filters.order,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_pg_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} sample records.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Report { filters, out } => {
            let store = db::PgStore::new(pool);
            let report = report::build_list_report(&store, filters.into()).await?;
            std::fs::write(&out, report::build_markdown(&report))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Report of {} records written to {}.",
                report.customers.len(),
                out.display()
            );
        }
        Commands::Serve { bind } => {
            let store = Arc::new(db::PgStore::new(pool));
            let app = web::app(store);
            web::listen(app, &bind)
                .await
                .context("failed to start HTTP server")?;
        }
    }

    Ok(())
}
