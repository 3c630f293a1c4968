//! Extraction-and-ingestion pipeline
//!
//! Wires one driver to one sink for a single pass: look up the advisory
//! resume cursor, enumerate task units, fan expansion out over the worker
//! slots and upsert every produced record under its content-addressed
//! identity. Individual units are allowed to fail; the pass keeps going and
//! reports what it skipped.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use buildsweep_common::Result;

use crate::config::PipelineConfig;
use crate::driver::Driver;
use crate::sink::{DocumentSink, UpsertOutcome};

pub mod executor;

pub use executor::{expand_unordered, TaskOutcome};

/// Counters reported at the end of one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Task units that reached a terminal outcome
    pub tasks_processed: usize,
    /// Units whose expansion succeeded
    pub tasks_succeeded: usize,
    /// Units skipped after a source or decode failure
    pub tasks_skipped: usize,
    /// Records written to the destination
    pub records_ingested: usize,
    /// Writes that stored a new identity
    pub records_created: usize,
    /// Writes that replaced an existing identity
    pub records_updated: usize,
    /// Writes refused by the destination
    pub records_failed: usize,
    /// Whether the pass was interrupted before draining every unit
    pub cancelled: bool,
    /// Wall-clock duration of the pass
    pub duration: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} task units processed ({} succeeded, {} skipped); \
             {} records ingested ({} created, {} updated, {} failed) in {:.1}s",
            self.tasks_processed,
            self.tasks_succeeded,
            self.tasks_skipped,
            self.records_ingested,
            self.records_created,
            self.records_updated,
            self.records_failed,
            self.duration.as_secs_f64(),
        )?;
        if self.cancelled {
            write!(f, " [interrupted]")?;
        }
        Ok(())
    }
}

/// One driver, one sink, one pass at a time
pub struct Pipeline {
    driver: Arc<dyn Driver>,
    sink: Arc<dyn DocumentSink>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        driver: Arc<dyn Driver>,
        sink: Arc<dyn DocumentSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            driver,
            sink,
            config,
        }
    }

    /// Run one extraction pass to completion, cancellation or abort.
    ///
    /// Returns `Err` only for failures that poison the whole run: invalid
    /// configuration, an enumeration that never got started, or a
    /// destination that keeps refusing writes. Per-unit failures are
    /// absorbed into the summary instead.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let source_type = self.driver.source_type();
        let started = Instant::now();
        info!(
            run_id = %run_id,
            driver = source_type,
            workers = self.config.workers,
            "Starting ingestion pass"
        );

        let cursor = if self.config.resume {
            let cursor = self.sink.latest_cursor(source_type).await;
            match &cursor {
                Some(found) => info!(
                    identity = %found.identity,
                    timestamp = %found.timestamp,
                    "Resume cursor found"
                ),
                None => info!("No resume cursor; crawling the full history"),
            }
            cursor
        } else {
            None
        };

        let tasks = self.driver.enumerate_tasks(cursor.as_ref()).await?;
        let mut outcomes = expand_unordered(
            Arc::clone(&self.driver),
            tasks,
            self.config.workers,
            cancel.clone(),
        );

        let mut summary = RunSummary::default();
        let mut consecutive_destination_failures = 0usize;

        'pass: while let Some(outcome) = outcomes.next().await {
            match outcome {
                TaskOutcome::Expanded { task, records } => {
                    summary.tasks_processed += 1;
                    let expanded = records.len();

                    for record in &records {
                        if cancel.is_cancelled() {
                            summary.cancelled = true;
                            break 'pass;
                        }

                        match self.sink.upsert(source_type, record).await {
                            Ok(outcome) => {
                                consecutive_destination_failures = 0;
                                summary.records_ingested += 1;
                                match outcome {
                                    UpsertOutcome::Created => summary.records_created += 1,
                                    UpsertOutcome::Updated => summary.records_updated += 1,
                                }
                            },
                            Err(upsert_error) => {
                                summary.records_failed += 1;
                                consecutive_destination_failures += 1;
                                warn!(
                                    task = %task,
                                    error = %upsert_error,
                                    "Upsert failed; the record will be covered by the next pass"
                                );
                                if consecutive_destination_failures
                                    >= self.config.destination_failure_limit
                                {
                                    error!(
                                        failures = consecutive_destination_failures,
                                        "Destination keeps refusing writes; aborting the pass"
                                    );
                                    return Err(upsert_error);
                                }
                            },
                        }
                    }

                    summary.tasks_succeeded += 1;
                    debug!(task = %task, records = expanded, "Task ingested");
                },
                TaskOutcome::Skipped { task, error } => {
                    if error.is_fatal() {
                        return Err(error);
                    }
                    summary.tasks_processed += 1;
                    summary.tasks_skipped += 1;
                    warn!(task = %task, error = %error, "Task skipped");
                },
                TaskOutcome::Cancelled { task } => {
                    summary.cancelled = true;
                    debug!(task = %task, "Task abandoned on cancellation");
                },
            }
        }

        if cancel.is_cancelled() {
            summary.cancelled = true;
        }
        summary.duration = started.elapsed();

        info!(
            run_id = %run_id,
            processed = summary.tasks_processed,
            succeeded = summary.tasks_succeeded,
            skipped = summary.tasks_skipped,
            ingested = summary.records_ingested,
            created = summary.records_created,
            updated = summary.records_updated,
            failed = summary.records_failed,
            cancelled = summary.cancelled,
            "Ingestion pass finished"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use buildsweep_common::SweepError;

    use crate::cursor::ResumeCursor;
    use crate::driver::TaskUnit;
    use crate::record::BuildRecord;

    /// Driver yielding a fixed number of units, each expanding into a fixed
    /// number of records; one unit may be scripted to fail.
    struct FixedDriver {
        units: usize,
        records_per_unit: usize,
        failing_unit: Option<usize>,
    }

    fn record(unit: usize, index: usize) -> BuildRecord {
        BuildRecord {
            host: "http://ci.local".to_string(),
            name: format!("job-{unit}"),
            number: (unit * 100 + index) as i64,
            timestamp: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            duration: 0,
            result: Some("SUCCESS".to_string()),
            causes: vec!["unknown".to_string()],
            test_total_count: 0,
            test_skip_count: 0,
            test_fail_count: 0,
        }
    }

    #[async_trait]
    impl Driver for FixedDriver {
        fn source_type(&self) -> &'static str {
            "builds"
        }

        async fn enumerate_tasks(
            &self,
            _cursor: Option<&ResumeCursor>,
        ) -> Result<BoxStream<'static, Result<TaskUnit>>> {
            let units: Vec<Result<TaskUnit>> = (0..self.units)
                .map(|unit| {
                    Ok(TaskUnit {
                        name: format!("job-{unit}"),
                        url: format!("http://ci.local/job/job-{unit}/"),
                        prefetched: None,
                    })
                })
                .collect();
            Ok(Box::pin(stream::iter(units)))
        }

        async fn expand_task(&self, task: TaskUnit) -> Result<Vec<BuildRecord>> {
            let unit: usize = task
                .name
                .trim_start_matches("job-")
                .parse()
                .unwrap_or_default();
            if self.failing_unit == Some(unit) {
                return Err(SweepError::malformed(&task.url, "scripted failure"));
            }
            Ok((0..self.records_per_unit)
                .map(|index| record(unit, index))
                .collect())
        }
    }

    /// Sink that counts calls and answers from a script.
    struct StubSink {
        upserts: AtomicUsize,
        cursor_lookups: AtomicUsize,
        refuse_writes: bool,
        existing: bool,
    }

    impl StubSink {
        fn accepting() -> Self {
            Self {
                upserts: AtomicUsize::new(0),
                cursor_lookups: AtomicUsize::new(0),
                refuse_writes: false,
                existing: false,
            }
        }

        fn refusing() -> Self {
            Self {
                refuse_writes: true,
                ..Self::accepting()
            }
        }

        fn with_existing_documents() -> Self {
            Self {
                existing: true,
                ..Self::accepting()
            }
        }
    }

    #[async_trait]
    impl DocumentSink for StubSink {
        async fn upsert(&self, _source_type: &str, _record: &BuildRecord) -> Result<UpsertOutcome> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.refuse_writes {
                return Err(SweepError::destination_unavailable(
                    "http://es.local:9200",
                    "HTTP 503",
                ));
            }
            Ok(if self.existing {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Created
            })
        }

        async fn latest_cursor(&self, _source_type: &str) -> Option<ResumeCursor> {
            self.cursor_lookups.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn pipeline(driver: FixedDriver, sink: Arc<StubSink>, config: PipelineConfig) -> Pipeline {
        Pipeline::new(Arc::new(driver), sink, config)
    }

    #[tokio::test]
    async fn test_clean_pass_counts_every_record() {
        let sink = Arc::new(StubSink::accepting());
        let driver = FixedDriver {
            units: 3,
            records_per_unit: 4,
            failing_unit: None,
        };

        let summary = pipeline(driver, Arc::clone(&sink), PipelineConfig::default())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.tasks_processed, 3);
        assert_eq!(summary.tasks_succeeded, 3);
        assert_eq!(summary.tasks_skipped, 0);
        assert_eq!(summary.records_ingested, 12);
        assert_eq!(summary.records_created, 12);
        assert_eq!(summary.records_updated, 0);
        assert_eq!(summary.records_failed, 0);
        assert!(!summary.cancelled);
        assert_eq!(sink.upserts.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_failed_unit_is_skipped_not_fatal() {
        let sink = Arc::new(StubSink::accepting());
        let driver = FixedDriver {
            units: 3,
            records_per_unit: 2,
            failing_unit: Some(1),
        };

        let summary = pipeline(driver, Arc::clone(&sink), PipelineConfig::default())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.tasks_processed, 3);
        assert_eq!(summary.tasks_succeeded, 2);
        assert_eq!(summary.tasks_skipped, 1);
        assert_eq!(summary.records_ingested, 4);
    }

    #[tokio::test]
    async fn test_repeat_pass_reports_updates() {
        let sink = Arc::new(StubSink::with_existing_documents());
        let driver = FixedDriver {
            units: 1,
            records_per_unit: 3,
            failing_unit: None,
        };

        let summary = pipeline(driver, Arc::clone(&sink), PipelineConfig::default())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.records_ingested, 3);
        assert_eq!(summary.records_created, 0);
        assert_eq!(summary.records_updated, 3);
    }

    #[tokio::test]
    async fn test_sustained_destination_outage_aborts() {
        let sink = Arc::new(StubSink::refusing());
        let driver = FixedDriver {
            units: 1,
            records_per_unit: 10,
            failing_unit: None,
        };
        let config = PipelineConfig {
            workers: 1,
            resume: false,
            destination_failure_limit: 5,
        };

        let result = pipeline(driver, Arc::clone(&sink), config)
            .run(CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(SweepError::DestinationUnavailable { .. })
        ));
        // The abort fires at the limit, not after every record has been
        // attempted.
        assert_eq!(sink.upserts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_resume_lookup_is_skipped_when_disabled() {
        let sink = Arc::new(StubSink::accepting());
        let driver = FixedDriver {
            units: 1,
            records_per_unit: 1,
            failing_unit: None,
        };
        let config = PipelineConfig {
            resume: false,
            ..PipelineConfig::default()
        };

        pipeline(driver, Arc::clone(&sink), config)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sink.cursor_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resume_lookup_runs_by_default() {
        let sink = Arc::new(StubSink::accepting());
        let driver = FixedDriver {
            units: 1,
            records_per_unit: 1,
            failing_unit: None,
        };

        pipeline(driver, Arc::clone(&sink), PipelineConfig::default())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sink.cursor_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_touches_nothing() {
        let sink = Arc::new(StubSink::accepting());
        let driver = FixedDriver {
            units: 5,
            records_per_unit: 5,
            failing_unit: None,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = pipeline(driver, Arc::clone(&sink), PipelineConfig::default())
            .run(cancel)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.records_ingested, 0);
        assert_eq!(sink.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_any_work() {
        let sink = Arc::new(StubSink::accepting());
        let driver = FixedDriver {
            units: 1,
            records_per_unit: 1,
            failing_unit: None,
        };
        let config = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };

        let result = pipeline(driver, Arc::clone(&sink), config)
            .run(CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SweepError::Config(_))));
        assert_eq!(sink.cursor_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(sink.upserts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_summary_display_reads_like_a_report() {
        let summary = RunSummary {
            tasks_processed: 12,
            tasks_succeeded: 10,
            tasks_skipped: 2,
            records_ingested: 420,
            records_created: 400,
            records_updated: 20,
            records_failed: 0,
            cancelled: false,
            duration: Duration::from_millis(3_210),
        };
        let text = summary.to_string();
        assert!(text.contains("12 task units processed"));
        assert!(text.contains("10 succeeded, 2 skipped"));
        assert!(text.contains("400 created, 20 updated"));
        assert!(text.contains("3.2s"));
        assert!(!text.contains("[interrupted]"));

        let interrupted = RunSummary {
            cancelled: true,
            ..summary
        };
        assert!(interrupted.to_string().ends_with("[interrupted]"));
    }
}
