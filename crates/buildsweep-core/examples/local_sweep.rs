//! Local extraction pass example
//!
//! Demonstrates how to wire a driver, sink, and pipeline together against a
//! build server and document store running on localhost
//!
//! Usage:
//! ```bash
//! cargo run --example local_sweep -- --jenkins http://localhost:8080 --workers 4
//! ```

use std::sync::Arc;

use anyhow::Result;
use buildsweep_core::{
    DestinationConfig, DriverRegistry, ElasticSink, Pipeline, PipelineConfig, SourceConfig,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Build server to crawl
    #[clap(long, default_value = "http://localhost:9090")]
    jenkins: String,

    /// Document store the records are loaded into
    #[clap(long, default_value = "http://localhost:9200")]
    elasticsearch: String,

    /// Parallel expansion workers
    #[clap(long, default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let source = SourceConfig::new(&args.jenkins)?;
    let destination = DestinationConfig::new(&args.elasticsearch)?;

    let driver = DriverRegistry::builtin().resolve("builds", &source)?;
    let sink = Arc::new(ElasticSink::new(&destination)?);

    let config = PipelineConfig {
        workers: args.workers,
        ..PipelineConfig::default()
    };

    info!(
        source = %args.jenkins,
        destination = %args.elasticsearch,
        "Starting local sweep"
    );

    let pipeline = Pipeline::new(driver, sink, config);
    let summary = pipeline.run(CancellationToken::new()).await?;

    println!("{summary}");
    Ok(())
}
