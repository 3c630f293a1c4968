//! Jenkins builds driver
//!
//! Walks a Jenkins instance over its JSON API. Enumeration hits the
//! instance-level listing endpoint to discover jobs; expansion fetches each
//! job at depth 2 so every build arrives with its actions (causes and test
//! results) inline, then flattens the build history into [`BuildRecord`]s.
//!
//! Fast mode trades memory for round-trips: one deep listing request pulls
//! the entire job tree, and expansion works off the prefetched payloads
//! without touching the network again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use buildsweep_common::{Result, SweepError};

use super::{Driver, TaskUnit};
use crate::config::{ensure_trailing_slash, SourceConfig};
use crate::cursor::ResumeCursor;
use crate::record::{BuildRecord, UNKNOWN_CAUSE};

/// Registry tag for this driver
pub const SOURCE_TYPE: &str = "builds";

/// Depth requested on detail endpoints so actions arrive inline
const DETAIL_DEPTH: u8 = 2;

/// Driver for Jenkins build histories
pub struct JenkinsDriver {
    client: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    fast: bool,
    /// Host field stamped on every record; doubles as the identity scope
    host: String,
}

impl JenkinsDriver {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| SweepError::config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = ensure_trailing_slash(&config.base_url);
        let host = base_url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            fast: config.fast,
            host,
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "Requesting");

        let mut request = self.client.get(url.clone());
        if let Some(ref username) = self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SweepError::source_unavailable(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SweepError::source_unavailable(
                url.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SweepError::source_unavailable(url.as_str(), e))?;
        serde_json::from_str(&body).map_err(|e| SweepError::malformed(url.as_str(), e))
    }

    /// Shallow listing: one task unit per job, details fetched later.
    async fn enumerate_listing(&self) -> Result<Vec<TaskUnit>> {
        let url = api_endpoint(self.base_url.as_str(), None)?;
        let listing: JobListing = self.fetch_json(url).await?;

        Ok(listing
            .jobs
            .into_iter()
            .map(|job| TaskUnit {
                name: job.name.unwrap_or_else(|| job.url.clone()),
                url: job.url,
                prefetched: None,
            })
            .collect())
    }

    /// Deep listing: the whole tree in one response, each job element kept
    /// as the prefetched payload of its task unit.
    async fn enumerate_deep(&self) -> Result<Vec<TaskUnit>> {
        let url = api_endpoint(self.base_url.as_str(), Some(DETAIL_DEPTH))?;
        let listing: serde_json::Value = self.fetch_json(url.clone()).await?;

        let jobs = listing
            .get("jobs")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| SweepError::malformed(url.as_str(), "listing has no 'jobs' array"))?;

        Ok(jobs
            .iter()
            .map(|job| {
                let name = job
                    .get("name")
                    .or_else(|| job.get("displayName"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("<unnamed>")
                    .to_string();
                let unit_url = job
                    .get("url")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                TaskUnit {
                    name,
                    url: unit_url,
                    prefetched: Some(job.clone()),
                }
            })
            .collect())
    }

    fn normalize_build(&self, job_name: &str, build: BuildInfo) -> Result<BuildRecord> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(build.timestamp).ok_or_else(|| {
            SweepError::malformed(
                &self.host,
                format!(
                    "build {} of '{}' carries out-of-range timestamp {}",
                    build.number, job_name, build.timestamp
                ),
            )
        })?;

        let mut causes: Vec<String> = Vec::new();
        let mut test_total_count = 0;
        let mut test_skip_count = 0;
        let mut test_fail_count = 0;

        // Deep listings pad the actions array with nulls; flatten() drops
        // them.
        for action in build.actions.into_iter().flatten() {
            if let Some(listed) = action.causes {
                for cause in listed {
                    let label = cause
                        .user_name
                        .or(cause.class_name)
                        .unwrap_or_else(|| UNKNOWN_CAUSE.to_string());
                    if !causes.contains(&label) {
                        causes.push(label);
                    }
                }
            }
            if let Some(total) = action.total_count {
                test_total_count = total;
                test_skip_count = action.skip_count.unwrap_or(0);
                test_fail_count = action.fail_count.unwrap_or(0);
            }
        }

        if causes.is_empty() {
            causes.push(UNKNOWN_CAUSE.to_string());
        }

        Ok(BuildRecord {
            host: self.host.clone(),
            name: job_name.to_string(),
            number: build.number,
            timestamp,
            duration: build.duration,
            result: build.result,
            causes,
            test_total_count,
            test_skip_count,
            test_fail_count,
        })
    }
}

#[async_trait]
impl Driver for JenkinsDriver {
    fn source_type(&self) -> &'static str {
        SOURCE_TYPE
    }

    async fn enumerate_tasks(
        &self,
        cursor: Option<&ResumeCursor>,
    ) -> Result<BoxStream<'static, Result<TaskUnit>>> {
        if let Some(cursor) = cursor {
            warn!(
                identity = %cursor.identity,
                "The builds driver cannot resume; crawling the full history"
            );
        }

        let units = if self.fast {
            self.enumerate_deep().await?
        } else {
            self.enumerate_listing().await?
        };
        info!(jobs = units.len(), source = %self.host, "Enumerated jobs");

        Ok(stream::iter(units.into_iter().map(Ok)).boxed())
    }

    async fn expand_task(&self, task: TaskUnit) -> Result<Vec<BuildRecord>> {
        let TaskUnit {
            name,
            url,
            prefetched,
        } = task;

        let detail: JobDetail = match prefetched {
            Some(payload) => {
                serde_json::from_value(payload).map_err(|e| SweepError::malformed(&url, e))?
            },
            None => {
                let endpoint = api_endpoint(&url, Some(DETAIL_DEPTH))?;
                self.fetch_json(endpoint).await?
            },
        };

        let JobDetail {
            display_name,
            name: detail_name,
            builds,
        } = detail;
        let job_name = display_name.or(detail_name).unwrap_or(name);

        let records = builds
            .into_iter()
            .map(|build| self.normalize_build(&job_name, build))
            .collect::<Result<Vec<_>>>()?;
        info!(job = %job_name, builds = records.len(), "Expanded job");

        Ok(records)
    }
}

/// Append the JSON API suffix to a resource URL, normalizing the trailing
/// slash so the last path segment is kept.
fn api_endpoint(raw: &str, depth: Option<u8>) -> Result<Url> {
    let mut base = raw.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    let mut url = Url::parse(&base)
        .and_then(|joined| joined.join("api/json"))
        .map_err(|e| SweepError::malformed(raw, format!("bad resource URL: {e}")))?;
    if let Some(depth) = depth {
        url.set_query(Some(&format!("depth={depth}")));
    }

    Ok(url)
}

// ============================================================================
// Wire Format
// ============================================================================

/// Instance-level job listing. A body without the `jobs` array is not a
/// Jenkins listing and fails deserialization rather than reading as an
/// empty instance.
#[derive(Debug, Deserialize)]
struct JobListing {
    jobs: Vec<JobSummary>,
}

/// One entry in a shallow job listing
#[derive(Debug, Deserialize)]
struct JobSummary {
    name: Option<String>,
    url: String,
}

/// Job detail at depth 2: builds arrive with their actions inline
#[derive(Debug, Deserialize)]
struct JobDetail {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    name: Option<String>,
    #[serde(default)]
    builds: Vec<BuildInfo>,
}

/// One build inside a job detail
#[derive(Debug, Clone, Deserialize)]
struct BuildInfo {
    number: i64,
    /// Scheduling time, epoch milliseconds
    timestamp: i64,
    #[serde(default)]
    duration: i64,
    result: Option<String>,
    #[serde(default)]
    actions: Vec<Option<BuildAction>>,
}

/// The action fields the normalizer cares about; everything else is ignored
#[derive(Debug, Clone, Deserialize)]
struct BuildAction {
    causes: Option<Vec<BuildCause>>,
    #[serde(rename = "totalCount")]
    total_count: Option<i64>,
    #[serde(rename = "skipCount")]
    skip_count: Option<i64>,
    #[serde(rename = "failCount")]
    fail_count: Option<i64>,
}

/// Trigger attribution inside a cause action
#[derive(Debug, Clone, Deserialize)]
struct BuildCause {
    #[serde(rename = "userName")]
    user_name: Option<String>,
    #[serde(rename = "_class")]
    class_name: Option<String>,
}
