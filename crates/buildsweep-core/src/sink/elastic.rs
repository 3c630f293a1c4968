//! Elasticsearch-backed document sink
//!
//! Documents live at `{index}/{source_type}/{identity}`. A PUT to that path
//! is a full-document upsert: the store answers 201 when the identity is
//! new and 200 when an existing document was replaced, which is exactly the
//! created/updated split the run summary reports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use buildsweep_common::{Result, SweepError};

use super::{DocumentSink, UpsertOutcome};
use crate::config::{ensure_trailing_slash, DestinationConfig};
use crate::cursor::ResumeCursor;
use crate::identity::record_identity;
use crate::record::BuildRecord;

/// Sink writing to an Elasticsearch-compatible HTTP API
pub struct ElasticSink {
    client: reqwest::Client,
    base_url: Url,
    index: String,
}

impl ElasticSink {
    pub fn new(config: &DestinationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SweepError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: ensure_trailing_slash(&config.base_url),
            index: config.index.clone(),
        })
    }

    fn collection_url(&self, source_type: &str, leaf: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{}/{}/{}", self.index, source_type, leaf))
            .map_err(|e| SweepError::config(format!("Cannot build destination URL: {e}")))
    }

    async fn search_latest(&self, source_type: &str) -> Result<Option<ResumeCursor>> {
        let url = self.collection_url(source_type, "_search")?;
        let query = json!({
            "size": 1,
            "sort": [{"timestamp": {"order": "desc"}}],
        });

        let response = self
            .client
            .post(url.clone())
            .json(&query)
            .send()
            .await
            .map_err(|e| SweepError::destination_unavailable(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SweepError::destination_unavailable(
                url.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SweepError::destination_unavailable(url.as_str(), e))?;
        cursor_from_search(&body, url.as_str())
    }
}

#[async_trait]
impl DocumentSink for ElasticSink {
    async fn upsert(&self, source_type: &str, record: &BuildRecord) -> Result<UpsertOutcome> {
        let identity = record_identity(record);
        let url = self.collection_url(source_type, &identity)?;

        let response = self
            .client
            .put(url.clone())
            .json(record)
            .send()
            .await
            .map_err(|e| SweepError::destination_unavailable(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SweepError::destination_unavailable(
                url.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let outcome = if status == reqwest::StatusCode::CREATED {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };
        debug!(
            job = %record.name,
            number = record.number,
            identity = %identity,
            outcome = outcome.as_str(),
            "Record stored"
        );

        Ok(outcome)
    }

    async fn latest_cursor(&self, source_type: &str) -> Option<ResumeCursor> {
        match self.search_latest(source_type).await {
            Ok(cursor) => cursor,
            Err(error) => {
                warn!(error = %error, "Resume cursor lookup failed; starting a full pass");
                None
            },
        }
    }
}

/// Pull the newest hit out of a search response body.
fn cursor_from_search(body: &str, url: &str) -> Result<Option<ResumeCursor>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| SweepError::malformed(url, e))?;

    Ok(response.hits.hits.into_iter().next().map(|hit| ResumeCursor {
        identity: hit.id,
        timestamp: hit.source.timestamp,
    }))
}

// ============================================================================
// Wire Format
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: SearchHits,
}

#[derive(Debug, Default, Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: HitSource,
}

/// The one stored field the cursor needs back
#[derive(Debug, Deserialize)]
struct HitSource {
    timestamp: DateTime<Utc>,
}
