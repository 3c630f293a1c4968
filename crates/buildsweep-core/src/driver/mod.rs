//! Driver abstraction and registry
//!
//! A driver teaches the pipeline how to crawl one kind of source: how to
//! enumerate units of work and how to expand each unit into normalized
//! records. The pipeline never sees source-specific wire formats; drivers
//! own them end to end.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use buildsweep_common::{Result, SweepError};

use crate::config::SourceConfig;
use crate::cursor::ResumeCursor;
use crate::record::BuildRecord;

pub mod jenkins;

/// One unit of extraction work.
///
/// The executor hands each unit back to [`Driver::expand_task`] exactly
/// once; units from one enumeration are never reused across runs.
#[derive(Debug, Clone)]
pub struct TaskUnit {
    /// Label for logs and the run summary
    pub name: String,
    /// Detail endpoint the expansion step fetches
    pub url: String,
    /// Detail payload captured during a deep enumeration; expansion skips
    /// its network round-trip when this is present
    pub prefetched: Option<serde_json::Value>,
}

/// A source-specific extraction capability set
#[async_trait]
pub trait Driver: Send + Sync {
    /// Tag namespacing this driver's records in the destination
    ///
    /// Must be a non-empty lowercase identifier; the document path in the
    /// destination is `{index}/{source_type}/{identity}`.
    fn source_type(&self) -> &'static str;

    /// Whether [`Driver::enumerate_tasks`] honors a resume cursor
    ///
    /// Advisory only. Drivers that return `false` receive the cursor anyway
    /// and are free to log and ignore it; correctness comes from idempotent
    /// upserts, not from resuming.
    fn supports_resume(&self) -> bool {
        false
    }

    /// Enumerate task units from the source, in discovery order.
    ///
    /// The stream is finite and consumed once. A failure here, before any
    /// unit has been expanded, aborts the run; failures on individual units
    /// later are isolated by the executor.
    async fn enumerate_tasks(
        &self,
        cursor: Option<&ResumeCursor>,
    ) -> Result<BoxStream<'static, Result<TaskUnit>>>;

    /// Expand one task unit into its normalized records, preserving the
    /// source's ordering within the unit. An empty vector is a valid
    /// expansion.
    async fn expand_task(&self, task: TaskUnit) -> Result<Vec<BuildRecord>>;
}

/// Factory producing a configured driver instance
pub type DriverFactory = Arc<dyn Fn(&SourceConfig) -> Result<Arc<dyn Driver>> + Send + Sync>;

/// Explicit tag-to-factory table handed to the pipeline at startup.
///
/// Nothing is registered implicitly: a process that wants the built-in
/// drivers asks for [`DriverRegistry::builtin`], a test that wants a stub
/// starts from [`DriverRegistry::empty`] and registers its own.
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Registry with no drivers
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in drivers
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(jenkins::SOURCE_TYPE, |config| {
            Ok(Arc::new(jenkins::JenkinsDriver::new(config)?) as Arc<dyn Driver>)
        });
        registry
    }

    /// Register a driver factory under a tag, replacing any previous entry
    pub fn register<F>(&mut self, tag: &str, factory: F)
    where
        F: Fn(&SourceConfig) -> Result<Arc<dyn Driver>> + Send + Sync + 'static,
    {
        self.factories.insert(tag.to_string(), Arc::new(factory));
    }

    /// Registered tags, sorted for stable listings
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Resolve a driver by tag and check its declaration against the
    /// registration.
    pub fn resolve(&self, tag: &str, config: &SourceConfig) -> Result<Arc<dyn Driver>> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| SweepError::DriverNotFound(tag.to_string()))?;
        let driver = factory(config)?;

        let declared = driver.source_type();
        if declared.is_empty()
            || !declared
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(SweepError::DriverContractViolation {
                driver: tag.to_string(),
                detail: format!("source type '{declared}' is not a lowercase identifier"),
            });
        }
        if declared != tag {
            return Err(SweepError::DriverContractViolation {
                driver: tag.to_string(),
                detail: format!("registered under '{tag}' but declares source type '{declared}'"),
            });
        }

        Ok(driver)
    }
}
