//! Advisory resume cursor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and timestamp of the most recently ingested record in a
/// destination namespace.
///
/// The cursor is strictly a skip-ahead hint. Drivers may honor it to avoid
/// re-fetching history they have already covered, or ignore it entirely;
/// because upserts are idempotent, a missing or stale cursor only costs
/// duplicate requests, never duplicate documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeCursor {
    /// Identity digest of the newest stored record
    pub identity: String,
    /// Its scheduling timestamp
    pub timestamp: DateTime<Utc>,
}
