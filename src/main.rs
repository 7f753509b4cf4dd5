use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mot_defect_insights::markdown::render_markdown;
use mot_defect_insights::{generate_report, AnalysisConfig, AnalysisReport};

mod db;

#[derive(Parser)]
#[command(name = "mot-defect-insights")]
#[command(about = "Finds defects occurring at elevated rates for a vehicle model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import test totals and defect counts from CSV files
    #[command(group(
        ArgGroup::new("files")
            .args(["tests", "defects"])
            .required(true)
            .multiple(true)
    ))]
    Import {
        #[arg(long)]
        tests: Option<PathBuf>,
        #[arg(long)]
        defects: Option<PathBuf>,
    },
    /// Analyse one make and model
    Analyze {
        #[arg(long)]
        make: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        reference_year: Option<i32>,
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyse every model in the corpus, one JSON report per model
    Batch {
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        reference_year: Option<i32>,
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long, default_value = "reports")]
        out_dir: PathBuf,
    },
    /// List component groups, or show which group a description resolves to
    Groups {
        #[arg(long)]
        resolve: Option<String>,
    },
}

fn load_config(reference_year: Option<i32>, top_n: Option<usize>) -> anyhow::Result<AnalysisConfig> {
    with_overrides(AnalysisConfig::from_env()?, reference_year, top_n)
}

fn with_overrides(
    mut config: AnalysisConfig,
    reference_year: Option<i32>,
    top_n: Option<usize>,
) -> anyhow::Result<AnalysisConfig> {
    if let Some(year) = reference_year {
        config.reference_year = year;
    }
    if let Some(limit) = top_n {
        config.top_n = limit;
    }
    config.validate()?;
    Ok(config)
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn render(report: &AnalysisReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Markdown => Ok(render_markdown(report)),
        OutputFormat::Json => serde_json::to_string_pretty(report).context("failed to encode report"),
    }
}

fn report_file_name(make: &str, model: &str) -> String {
    let slug: String = format!("{make}-{model}")
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{slug}.json")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mot_defect_insights=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { tests, defects } => {
            let pool = connect().await?;
            if let Some(path) = tests {
                let imported = db::import_vehicle_tests(&pool, &path).await?;
                println!("Imported {imported} test total rows from {}.", path.display());
            }
            if let Some(path) = defects {
                let imported = db::import_defects(&pool, &path).await?;
                println!("Imported {imported} defect rows from {}.", path.display());
            }
        }
        Commands::Analyze {
            make,
            model,
            reference_year,
            top_n,
            format,
            out,
        } => {
            let config = load_config(reference_year, top_n)?;
            let resolver = config.resolver()?;
            let pool = connect().await?;
            let corpus = db::fetch_corpus(&pool).await?;
            if corpus.is_empty() {
                tracing::warn!("corpus is empty; run `seed` or `import` first");
            }

            let report = generate_report(&corpus, &resolver, &make, &model, &config);
            let rendered = render(&report, format)?;

            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Batch {
            make,
            reference_year,
            top_n,
            out_dir,
        } => {
            let config = load_config(reference_year, top_n)?;
            let resolver = config.resolver()?;
            let pool = connect().await?;
            let corpus = db::fetch_corpus(&pool).await?;
            if corpus.is_empty() {
                tracing::warn!("corpus is empty; run `seed` or `import` first");
            }

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;

            let models: Vec<(String, String)> = corpus
                .models()
                .into_iter()
                .filter(|(m, _)| make.as_deref().map_or(true, |wanted| m.eq_ignore_ascii_case(wanted)))
                .collect();

            if models.is_empty() {
                println!("No models found in the corpus.");
                return Ok(());
            }

            let mut sparse = 0usize;
            for (model_make, model_name) in &models {
                let report = generate_report(&corpus, &resolver, model_make, model_name, &config);
                if report.data_sparse {
                    sparse += 1;
                }
                let path = out_dir.join(report_file_name(model_make, model_name));
                std::fs::write(&path, render(&report, OutputFormat::Json)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }

            println!(
                "Wrote {} reports to {} ({} with insufficient data).",
                models.len(),
                out_dir.display(),
                sparse
            );
        }
        Commands::Groups { resolve } => {
            let config = AnalysisConfig::from_env()?;
            let resolver = config.resolver()?;

            match resolve {
                Some(description) => match resolver.resolve_group(&description) {
                    Some(group) => println!("{} ({})", group.group_id, group.display_name),
                    None => println!("ungrouped"),
                },
                None => {
                    for group in resolver.groups() {
                        println!(
                            "- {}: {} [{}] {} patterns",
                            group.group_id,
                            group.display_name,
                            group.category,
                            group.patterns.len()
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
