//! Buildsweep Core Library
//!
//! Extraction-and-ingestion pipeline for build automation servers: a
//! [`Driver`] enumerates units of work and expands each into normalized
//! [`BuildRecord`]s, a worker pool fans the expansion out, and a
//! [`DocumentSink`] upserts every record into a document store under a
//! content-addressed identity.
//!
//! # Overview
//!
//! - **Drivers**: source-specific crawlers behind the [`Driver`] trait,
//!   resolved from an explicit [`DriverRegistry`] by tag
//! - **Identity**: SHA-256 over the locating fields of a record, making
//!   every upsert idempotent
//! - **Pipeline**: bounded parallel fan-out with skip-and-log fault
//!   isolation, graceful cancellation and an advisory resume cursor
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use buildsweep_core::{
//!     DestinationConfig, DriverRegistry, ElasticSink, Pipeline, PipelineConfig, SourceConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> buildsweep_core::Result<()> {
//! let source = SourceConfig::new("http://localhost:9090")?;
//! let destination = DestinationConfig::new("http://localhost:9200")?;
//!
//! let driver = DriverRegistry::builtin().resolve("builds", &source)?;
//! let sink = Arc::new(ElasticSink::new(&destination)?);
//!
//! let pipeline = Pipeline::new(driver, sink, PipelineConfig::default());
//! let summary = pipeline.run(CancellationToken::new()).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod driver;
pub mod identity;
pub mod pipeline;
pub mod record;
pub mod sink;

// Re-export commonly used types
pub use buildsweep_common::{Result, SweepError};

pub use config::{DestinationConfig, PipelineConfig, SourceConfig};
pub use cursor::ResumeCursor;
pub use driver::{Driver, DriverRegistry, TaskUnit};
pub use identity::record_identity;
pub use pipeline::{Pipeline, RunSummary, TaskOutcome};
pub use record::BuildRecord;
pub use sink::{DocumentSink, ElasticSink, UpsertOutcome};
