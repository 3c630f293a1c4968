//! Buildsweep CLI - command-line entry point

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use buildsweep_common::logging::{init_logging, LogConfig, LogLevel};
use buildsweep_core::config::{
    DEFAULT_DESTINATION_URL, DEFAULT_INDEX, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOURCE_URL,
};
use buildsweep_core::{
    DestinationConfig, DriverRegistry, ElasticSink, Pipeline, PipelineConfig, SourceConfig,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "buildsweep")]
#[command(author, version, about = "Sweeps build records out of a build server into a document store")]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run one extraction pass
    Run {
        /// Build server to crawl
        #[arg(short, long, env = "SWEEP_JENKINS_URL", default_value = DEFAULT_SOURCE_URL)]
        jenkins: String,

        /// Document store the records are upserted into
        #[arg(short, long, env = "SWEEP_ELASTICSEARCH_URL", default_value = DEFAULT_DESTINATION_URL)]
        elasticsearch: String,

        /// Driver tag to extract with
        #[arg(short, long, env = "SWEEP_DRIVER", default_value = "builds")]
        driver: String,

        /// Destination index namespace
        #[arg(long, default_value = DEFAULT_INDEX)]
        index: String,

        /// Parallel expansion workers (defaults to the host's core count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Fetch the whole job tree in one deep listing request
        #[arg(long)]
        fast: bool,

        /// Skip the resume-cursor lookup and crawl the full history
        #[arg(long)]
        no_resume: bool,

        /// HTTP basic-auth user for the build server
        #[arg(long, env = "SWEEP_USERNAME")]
        username: Option<String>,

        /// HTTP basic-auth password for the build server
        #[arg(long, env = "SWEEP_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
        timeout_secs: u64,

        /// Skip TLS certificate verification on the build server
        #[arg(long)]
        insecure: bool,
    },

    /// List the registered driver tags
    Drivers,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging based on environment, then the verbose flag
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }

    // Ignore errors as the CLI should work without logging
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            jenkins,
            elasticsearch,
            driver,
            index,
            workers,
            fast,
            no_resume,
            username,
            password,
            timeout_secs,
            insecure,
        } => {
            let mut source = SourceConfig::new(&jenkins)?;
            source.username = username;
            source.password = password;
            source.timeout = Duration::from_secs(timeout_secs);
            source.insecure = insecure;
            source.fast = fast;

            if index.trim().is_empty() {
                anyhow::bail!("The destination index cannot be empty");
            }
            let mut destination = DestinationConfig::new(&elasticsearch)?;
            destination.index = index;
            destination.timeout = Duration::from_secs(timeout_secs);

            let mut config = PipelineConfig::default();
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.resume = !no_resume;

            run_pass(&driver, source, destination, config).await?;
        },
        Command::Drivers => {
            for tag in DriverRegistry::builtin().tags() {
                println!("{tag}");
            }
        },
    }

    Ok(())
}

/// Run one extraction pass end to end.
///
/// Per-job failures are skipped and counted in the printed summary; only
/// setup errors and a sustained destination outage exit non-zero.
async fn run_pass(
    driver_tag: &str,
    source: SourceConfig,
    destination: DestinationConfig,
    config: PipelineConfig,
) -> Result<()> {
    let driver = DriverRegistry::builtin().resolve(driver_tag, &source)?;
    let sink = Arc::new(ElasticSink::new(&destination)?);

    info!(
        source = %source.base_url,
        destination = %destination.base_url,
        driver = driver_tag,
        "Starting extraction pass"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; draining in-flight work");
            interrupt.cancel();
        }
    });

    let pipeline = Pipeline::new(driver, sink, config);
    let summary = pipeline.run(cancel).await?;

    println!("{summary}");
    if summary.cancelled {
        println!("Interrupted before completion; rerun to pick up the remainder.");
    }

    Ok(())
}
