//! Pipeline configuration

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use buildsweep_common::{Result, SweepError};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default source instance for local development.
pub const DEFAULT_SOURCE_URL: &str = "http://localhost:9090";

/// Default destination store for local development.
pub const DEFAULT_DESTINATION_URL: &str = "http://localhost:9200";

/// Default destination index namespace.
pub const DEFAULT_INDEX: &str = "jenkins";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Consecutive destination write failures tolerated before the run aborts.
pub const DEFAULT_DESTINATION_FAILURE_LIMIT: usize = 5;

/// Connection settings for the crawled source instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    /// Skip TLS certificate verification (self-signed lab instances)
    pub insecure: bool,
    /// Fetch the whole job tree in one deep listing request instead of one
    /// detail request per job. Fewer round-trips, more memory.
    pub fast: bool,
}

impl SourceConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_http_url(base_url, "source")?,
            username: None,
            password: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            insecure: false,
            fast: false,
        })
    }
}

/// Connection settings for the destination document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub base_url: Url,
    /// Index namespace the records land in
    pub index: String,
    pub timeout: Duration,
}

impl DestinationConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_http_url(base_url, "destination")?,
            index: DEFAULT_INDEX.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }
}

/// Knobs for the fan-out stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent expansion slots
    pub workers: usize,
    /// Query the destination for a resume cursor before enumerating
    pub resume: bool,
    /// Consecutive destination write failures before the run aborts
    pub destination_failure_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            resume: true,
            destination_failure_limit: DEFAULT_DESTINATION_FAILURE_LIMIT,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SweepError::config("Worker count must be at least 1"));
        }
        if self.destination_failure_limit == 0 {
            return Err(SweepError::config(
                "Destination failure limit must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Number of expansion workers used when the operator does not pick one.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn parse_http_url(raw: &str, role: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| SweepError::config(format!("Invalid {role} URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SweepError::config(format!(
            "The {role} URL '{raw}' must be http or https, got '{other}'"
        ))),
    }
}

/// Append a trailing slash so `Url::join` treats the base as a directory
/// rather than replacing its last path segment.
pub(crate) fn ensure_trailing_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        return url.clone();
    }
    let mut slashed = url.clone();
    slashed.set_path(&format!("{}/", url.path()));
    slashed
}
