//! Destination sinks
//!
//! A sink owns the write side of the pipeline: identity-keyed upserts plus
//! the advisory resume-cursor lookup. The pipeline only ever talks to the
//! [`DocumentSink`] trait, so tests can swap the document store for a stub.

use async_trait::async_trait;

use buildsweep_common::Result;

use crate::cursor::ResumeCursor;
use crate::record::BuildRecord;

pub mod elastic;

pub use elastic::ElasticSink;

/// Outcome of an identity-keyed upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The identity did not exist before; a new document was stored
    Created,
    /// The identity already existed; the document was replaced in place
    Updated,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        }
    }
}

/// Write side of the pipeline
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Upsert one record under its content-addressed identity.
    ///
    /// Storing the same record twice must be a no-op apart from the
    /// [`UpsertOutcome::Updated`] classification; that property is what
    /// lets interrupted runs simply be rerun.
    async fn upsert(&self, source_type: &str, record: &BuildRecord) -> Result<UpsertOutcome>;

    /// Identity and timestamp of the most recently ingested record for a
    /// source type, if the namespace holds any.
    ///
    /// Best effort: lookup failures surface as `None`, never as an error,
    /// because a run without a cursor is merely slower.
    async fn latest_cursor(&self, source_type: &str) -> Option<ResumeCursor>;
}
