use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use survey_stats::config::{resolve_score_range, Config, DEFAULT_CONFIG_FILE};
use survey_stats::db::{self, PgStore};
use survey_stats::deployment::{load_deployment, SurveyScope, WindowState};
use survey_stats::report;
use survey_stats::store::SurveyStore;
use survey_stats::{build_histogram, is_eligible};

#[derive(Parser)]
#[command(name = "survey-stats")]
#[command(about = "Score distributions and window checks for survey deployments", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to ./survey-stats.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    InitConfig,
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import answers from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Check a deployment's start/end window
    Validate {
        #[arg(long)]
        deployment: i64,
    },
    /// Count answers per score for one question of a deployment
    Histogram {
        #[arg(long)]
        question: i64,
        #[arg(long, allow_negative_numbers = true)]
        deployment: i64,
        /// Comma-separated score buckets, e.g. 0,1,2,3,4,5
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        scores: Option<Vec<i64>>,
    },
    /// Generate a markdown report for a deployment
    Report {
        #[arg(long)]
        deployment: i64,
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        scores: Option<Vec<i64>>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(config: &Config) -> anyhow::Result<PgStore> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(PgStore::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.command {
        Commands::InitConfig => Config::default(),
        _ => Config::discover(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::InitConfig => {
            let path = cli
                .config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            std::fs::write(&path, Config::default_toml())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Config written to {}.", path.display());
        }
        Commands::InitDb => {
            let store = connect(&config).await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = connect(&config).await?;
            db::seed(store.pool()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let store = connect(&config).await?;
            let inserted = db::import_csv(store.pool(), &csv).await?;
            println!("Inserted {inserted} answers from {}.", csv.display());
        }
        Commands::Validate { deployment } => {
            let store = connect(&config).await?;
            let scoped = load_deployment(&store, deployment)
                .await?
                .with_context(|| format!("deployment {deployment} not found"))?;

            match scoped.validate_at(Utc::now()) {
                WindowState::Invalid(violations) => {
                    println!("Deployment {deployment} is invalid:");
                    for (key, messages) in violations.iter() {
                        for message in messages {
                            println!("- {key}: {message}");
                        }
                    }
                    std::process::exit(2);
                }
                state => println!("Deployment {deployment} is {}.", state.label()),
            }
        }
        Commands::Histogram {
            question,
            deployment,
            scores,
        } => {
            let store = connect(&config).await?;
            let questionnaire_range = match store.find_question(question).await? {
                Some(found) => {
                    if !is_eligible(&found) {
                        tracing::warn!(
                            question_id = question,
                            question_type = ?found.question_type,
                            "question type is not aggregated in reports"
                        );
                    }
                    store
                        .find_questionnaire(found.questionnaire_id)
                        .await?
                        .map(|q| q.score_range())
                }
                None => None,
            };
            let score_range = resolve_score_range(scores, &config, questionnaire_range);

            let counts =
                build_histogram(&store, question, deployment, score_range.as_deref()).await?;

            match score_range {
                None => println!("No score range configured."),
                Some(score_range) => {
                    print!("{}", report::render_histogram(&score_range, &counts));
                }
            }
        }
        Commands::Report {
            deployment,
            scores,
            out,
        } => {
            let store = connect(&config).await?;
            let collected =
                report::collect_report(&store, deployment, scores, &config, Utc::now())
                    .await?
                    .with_context(|| format!("deployment {deployment} not found"))?;
            std::fs::write(&out, report::build_report(&collected))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
