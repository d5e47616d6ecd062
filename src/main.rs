mod config;
mod http;
mod llm;
mod metrics;
mod models;
mod pipeline;
mod prompt;
mod report;
mod shopify;

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use config::Config;
use llm::AnthropicClient;
use pipeline::{Pacing, Pipeline, RunOutcome};
use shopify::CatalogClient;

#[derive(Parser, Debug)]
#[command(
    name = "calliope",
    version,
    about = "Drafts marketing blog copy for a Shopify catalog"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// One blog post per fetched product.
    Products {
        /// Catalog page size (1-250).
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Seconds to wait between items; 0 disables pacing.
        #[arg(long, default_value_t = 5)]
        delay_secs: u64,
    },
    /// One blog post covering a category of products.
    Category {
        /// Category to match; prompted interactively when omitted.
        #[arg(long)]
        category: Option<String>,
        /// Page size for the initial grouping-attribute probe.
        #[arg(long, default_value_t = 10)]
        probe_limit: u32,
        /// Seconds to wait between items; 0 disables pacing.
        #[arg(long, default_value_t = 5)]
        delay_secs: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(RunOutcome::Completed(stats)) => {
            info!(
                target = "calliope",
                generated = stats.generated,
                failed = stats.failed,
                "done",
            );
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::NothingToDo) => {
            info!(target = "calliope", "nothing to do");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(target = "calliope", "run failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> eyre::Result<RunOutcome> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    let config = Config::from_env().wrap_err("configuration incomplete")?;
    config.log_startup();

    let llm = AnthropicClient::new(&config.anthropic);
    llm.preflight()
        .await
        .wrap_err("generation API preflight failed")?;
    info!(target = "calliope", "generation API authentication successful");

    let catalog = CatalogClient::new(&config.shopify);

    match cli.command {
        Command::Products { limit, delay_secs } => {
            let pipeline = Pipeline::new(catalog, llm, pacing_from(delay_secs));
            Ok(pipeline.run_products(limit).await?)
        }
        Command::Category {
            category,
            probe_limit,
            delay_secs,
        } => {
            let pipeline = Pipeline::new(catalog, llm, pacing_from(delay_secs));
            let outcome = pipeline
                .run_category(probe_limit, move |field| match category {
                    Some(value) => Ok(value),
                    None => ask_category(field),
                })
                .await?;
            Ok(outcome)
        }
    }
}

fn pacing_from(delay_secs: u64) -> Pacing {
    if delay_secs == 0 {
        Pacing::none()
    } else {
        Pacing::fixed(Duration::from_secs(delay_secs))
    }
}

/// One line of operator input naming the category to filter on.
fn ask_category(field: &str) -> io::Result<String> {
    print!("Enter the category to generate a blog post for (based on {field}): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
