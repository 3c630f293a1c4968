//! Content-addressed record identity
//!
//! The destination document id is a SHA-256 digest over the fields that
//! locate a build: source host, job name, build number and scheduling
//! timestamp. Two crawls of the same build always produce the same digest,
//! which is what makes the upsert path idempotent.

use sha2::{Digest, Sha256};

use crate::record::BuildRecord;

/// Compute the stable identity digest for a record.
///
/// Each field is hashed behind a big-endian length prefix, so neighbouring
/// variable-length values can never collide by sliding characters across a
/// field boundary (job "a" build 123 vs job "a1" build 23).
pub fn record_identity(record: &BuildRecord) -> String {
    let number = record.number.to_string();
    let timestamp = record.canonical_timestamp();

    let mut hasher = Sha256::new();
    for field in [
        record.host.as_str(),
        record.name.as_str(),
        number.as_str(),
        timestamp.as_str(),
    ] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }

    hex::encode(hasher.finalize())
}
