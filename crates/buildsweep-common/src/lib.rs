//! Buildsweep Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error taxonomy and logging setup for the buildsweep workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all buildsweep members:
//!
//! - **Error Handling**: The [`SweepError`] taxonomy and [`Result`] alias
//! - **Logging**: Tracing subscriber configuration and initialization
//!
//! # Example
//!
//! ```no_run
//! use buildsweep_common::{Result, SweepError};
//!
//! fn parse_workers(raw: &str) -> Result<usize> {
//!     raw.parse()
//!         .map_err(|_| SweepError::config(format!("invalid worker count: {raw}")))
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SweepError};
