//! Parallel task fan-out
//!
//! Expansion is where the pipeline spends its time, so task units are
//! spread over a bounded set of concurrent slots with `buffer_unordered`.
//! Outcomes surface in completion order, not submission order; the consumer
//! must not assume anything about interleaving beyond "every submitted unit
//! yields exactly one outcome".

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use buildsweep_common::{Result, SweepError};

use crate::driver::{Driver, TaskUnit};
use crate::record::BuildRecord;

/// Label attached to failures of the enumeration stream itself, where no
/// task unit exists yet to blame.
const ENUMERATION_LABEL: &str = "(enumeration)";

/// What became of one task unit
#[derive(Debug)]
pub enum TaskOutcome {
    /// Expansion succeeded; records are in the unit's own order
    Expanded {
        task: String,
        records: Vec<BuildRecord>,
    },
    /// This unit failed; the run continues without it
    Skipped { task: String, error: SweepError },
    /// Cancellation fired before this unit finished
    Cancelled { task: String },
}

/// Fan task expansion out over `workers` concurrent slots, yielding
/// outcomes in completion order.
///
/// Units are pulled from `tasks` lazily as slots free up, so a driver that
/// enumerates incrementally is never drained ahead of need. Once `cancel`
/// fires, intake closes even if enumeration is mid-poll, and in-flight
/// expansions resolve to [`TaskOutcome::Cancelled`] instead of running to
/// completion.
pub fn expand_unordered(
    driver: Arc<dyn Driver>,
    tasks: BoxStream<'static, Result<TaskUnit>>,
    workers: usize,
    cancel: CancellationToken,
) -> BoxStream<'static, TaskOutcome> {
    tasks
        .take_until(cancel.clone().cancelled_owned())
        .map(move |entry| {
            let driver = Arc::clone(&driver);
            let cancel = cancel.clone();

            async move {
                let task = match entry {
                    Ok(task) => task,
                    Err(error) => {
                        return TaskOutcome::Skipped {
                            task: ENUMERATION_LABEL.to_string(),
                            error,
                        };
                    },
                };

                let name = task.name.clone();
                tokio::select! {
                    _ = cancel.cancelled() => TaskOutcome::Cancelled { task: name },
                    expansion = driver.expand_task(task) => match expansion {
                        Ok(records) => TaskOutcome::Expanded {
                            task: name,
                            records,
                        },
                        Err(error) => TaskOutcome::Skipped { task: name, error },
                    },
                }
            }
        })
        .buffer_unordered(workers.max(1))
        .boxed()
}
