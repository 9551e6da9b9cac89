use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod import;
mod models;
mod rating;
mod report;

#[derive(Parser)]
#[command(name = "meeting-feedback-reports")]
#[command(about = "Survey reports for meeting feedback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import survey answers from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Build the report for one survey
    Report {
        #[arg(long)]
        survey: Uuid,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the dashboard summary across all surveys
    Summary {
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
    },
    /// Print monthly response trends
    Trends {
        #[arg(long)]
        survey: Option<Uuid>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = config::Config::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} answers from {}.", csv.display());
        }
        Commands::Report {
            survey,
            format,
            out,
        } => {
            let details = db::fetch_survey(&pool, survey).await?;
            let snapshot = db::fetch_snapshot(&pool, Some(survey)).await?;
            warn_on_orphans(&snapshot);

            let report = report::build_survey_report(&snapshot);
            info!(
                survey = %details.id,
                status = %details.status,
                anonymous = details.is_anonymous,
                template = %details.template_id,
                responses = report.total_responses,
                "built survey report"
            );

            let rendered = match format {
                Format::Markdown => report::render_markdown(&details.name, &report, &snapshot),
                Format::Json => serde_json::to_string_pretty(&report)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Summary { format } => {
            let surveys = db::fetch_surveys(&pool).await?;
            let snapshot = db::fetch_snapshot(&pool, None).await?;
            warn_on_orphans(&snapshot);

            let summary = report::build_dashboard_summary(&surveys, &snapshot);
            match format {
                Format::Markdown => print!("{}", report::render_dashboard(&summary)),
                Format::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
        }
        Commands::Trends { survey } => {
            let snapshot = db::fetch_snapshot(&pool, survey).await?;
            let trends = report::monthly_trends(&snapshot);

            if trends.is_empty() {
                println!("No responses recorded yet.");
                return Ok(());
            }

            println!("Responses by month:");
            for point in trends {
                println!(
                    "- {}: {} responses, avg {:.2}",
                    point.month.format("%Y-%m"),
                    point.responses,
                    point.average_rating
                );
            }
        }
    }

    Ok(())
}

fn warn_on_orphans(snapshot: &models::ReportSnapshot) {
    let orphaned = report::orphaned_answers(snapshot);
    if orphaned > 0 {
        warn!(
            orphaned,
            "answers reference questions outside the survey template; excluded from question ratings"
        );
    }
}
