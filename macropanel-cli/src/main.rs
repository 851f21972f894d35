//! Macropanel CLI: one subcommand per pipeline stage.
//!
//! Commands:
//! - `fetch`: download the FRED series catalog into the raw directory
//! - `fetch-bls`: download the BLS national series into `raw/bls`
//! - `fetch-missing`: keyless backfill of raw files that do not exist yet
//! - `merge`: assemble the analysis panel and its quality report
//! - `enrich`: add shares and derived variables, write the data dictionary
//! - `summary`: print per-state statistics and the correlation matrix
//!
//! Exit codes: 0 on success, 2 on configuration errors, 1 on anything else.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use macropanel_core::data::StdoutProgress;
use macropanel_runner::{
    bls_provider, fred_provider, fredgraph_provider, parse_date, run_enrich, run_fetch,
    run_fetch_bls, run_fetch_missing, run_merge, run_summary, ConfigError, Credentials,
    PipelineConfig, StageError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "macropanel",
    version,
    about = "Macropanel CLI: state-by-month macroeconomic panel builder"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file. Defaults to $MACROPANEL_CONFIG, then ./macropanel.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every FRED series in the catalog.
    Fetch {
        /// First observation date (YYYY-MM-DD). Defaults to the configured start date.
        #[arg(long)]
        start_date: Option<String>,

        /// FRED API key. Defaults to $FRED_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Fetch the BLS national series.
    FetchBls {
        /// First observation date (YYYY-MM-DD). Defaults to the configured start date.
        #[arg(long)]
        start_date: Option<String>,

        /// BLS registration key. Defaults to $BLS_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Download absent raw files from the keyless FRED graph endpoint.
    FetchMissing {
        /// First observation date (YYYY-MM-DD). Defaults to the configured start date.
        #[arg(long)]
        start_date: Option<String>,
    },
    /// Merge raw series into the analysis panel.
    Merge {
        /// Clip the panel to start no earlier than this date (YYYY-MM-DD).
        #[arg(long)]
        start_date: Option<String>,
    },
    /// Add employment shares and derived variables to the analysis panel.
    Enrich,
    /// Print descriptive statistics for the latest panel.
    Summary,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    macropanel_runner::config::load_dotenv();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("\n✗ ERROR: {err}");
            for cause in err.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let config_error = err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || cause
                .downcast_ref::<StageError>()
                .is_some_and(StageError::is_config)
    });
    if config_error {
        2
    } else {
        1
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            start_date,
            api_key,
        } => run_fetch_cmd(&config, start_date, api_key),
        Commands::FetchBls {
            start_date,
            api_key,
        } => run_fetch_bls_cmd(&config, start_date, api_key),
        Commands::FetchMissing { start_date } => run_fetch_missing_cmd(&config, start_date),
        Commands::Merge { start_date } => run_merge_cmd(&config, start_date),
        Commands::Enrich => run_enrich_cmd(&config),
        Commands::Summary => run_summary_cmd(&config),
    }
}

fn start_override(value: Option<String>) -> Result<Option<NaiveDate>, ConfigError> {
    value.as_deref().map(parse_date).transpose()
}

fn banner(title: &str) {
    println!("{}", "=".repeat(70));
    println!("{title}");
    println!("{}", "=".repeat(70));
}

fn run_fetch_cmd(
    config: &PipelineConfig,
    start_date: Option<String>,
    api_key: Option<String>,
) -> Result<()> {
    let start = start_override(start_date)?;
    let credentials = Credentials::fred(api_key.as_deref())?;
    let provider = fred_provider(config, &credentials)?;

    banner("FETCH: FRED series");
    let outcome = run_fetch(config, &provider, start, &StdoutProgress)
        .context("fetch stage failed")?;
    println!(
        "\n✓ {} files written to {}",
        outcome.written.len(),
        config.raw_dir.display()
    );
    Ok(())
}

fn run_fetch_bls_cmd(
    config: &PipelineConfig,
    start_date: Option<String>,
    api_key: Option<String>,
) -> Result<()> {
    let start = start_override(start_date)?;
    let credentials = Credentials::bls(api_key.as_deref())?;
    let provider = bls_provider(config, &credentials)?;

    banner("FETCH: BLS series");
    let outcome = run_fetch_bls(config, &provider, start, &StdoutProgress)
        .context("BLS fetch stage failed")?;
    println!(
        "\n✓ {} files written to {}",
        outcome.written.len(),
        config.bls_dir().display()
    );
    Ok(())
}

fn run_fetch_missing_cmd(config: &PipelineConfig, start_date: Option<String>) -> Result<()> {
    let start = start_override(start_date)?;
    let provider = fredgraph_provider(config)?;

    banner("FETCH-MISSING: keyless backfill");
    let outcome = run_fetch_missing(config, &provider, start, &StdoutProgress)
        .context("backfill stage failed")?;
    for file in &outcome.manifest.skipped {
        println!("  - {file} (already present)");
    }
    println!(
        "\n✓ {} files written to {}",
        outcome.written.len(),
        config.raw_dir.display()
    );
    Ok(())
}

fn run_merge_cmd(config: &PipelineConfig, start_date: Option<String>) -> Result<()> {
    let start = start_override(start_date)?;

    banner("MERGE: analysis panel");
    let outcome = run_merge(config, start).context("merge stage failed")?;
    for path in &outcome.written {
        println!("  ✓ {}", path.display());
    }
    println!(
        "\n✓ {} observations, {} states (common range {} to {})",
        outcome.panel.len(),
        outcome.report.states,
        outcome.common_start,
        outcome.common_end
    );
    info!(balanced = outcome.report.balance.is_balanced(), "panel balance");
    Ok(())
}

fn run_enrich_cmd(config: &PipelineConfig) -> Result<()> {
    banner("ENRICH: shares and derived variables");
    let outcome = run_enrich(config).context("enrich stage failed")?;
    for path in &outcome.written {
        println!("  ✓ {}", path.display());
    }
    println!(
        "\n✓ {} observations, {} columns",
        outcome.panel.len(),
        outcome.panel.header().len()
    );
    Ok(())
}

fn run_summary_cmd(config: &PipelineConfig) -> Result<()> {
    let summary = run_summary(config).context("summary failed")?;
    print!("{}", summary.render());
    Ok(())
}
