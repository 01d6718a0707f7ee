//! Marine mammal diversity report generator.
//!
//! Runs the batch pipeline once for a YAML config and exits.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use diversity_report::{failure_category, run_report, ReportConfig};

#[derive(Parser, Debug)]
#[command(name = "diversity-report")]
#[command(about = "Species richness and phylogenetic diversity maps from range polygons and a phylogeny")]
struct Args {
    /// Report configuration file
    #[arg(short, long, env = "REPORT_CONFIG", default_value = "config/report.yaml")]
    config: PathBuf,

    /// Override the configured output directory
    #[arg(short, long, env = "REPORT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    info!(config = %args.config.display(), "Starting diversity report");

    let mut config = ReportConfig::load(&args.config)?;
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }

    let outcome = match run_report(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                category = failure_category(&e),
                error = %format!("{:#}", e),
                "Report failed"
            );
            return Err(e).context("diversity report did not complete");
        }
    };

    info!(
        cells = outcome.summary.cells,
        species = outcome.summary.species,
        outputs = outcome.summary.outputs.len(),
        dir = %outcome.output_dir.display(),
        "Done"
    );
    Ok(())
}
