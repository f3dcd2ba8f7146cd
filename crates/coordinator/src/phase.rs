use std::collections::{BTreeSet, VecDeque};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use grist_core::taskset::{Partition, Phase};

use crate::api::{EventTag, JobEvent, JobFailure, TaskOutcome, TaskRequest};
use crate::clients::{EventSink, OobStore, WorkerPool};
use crate::failure::FailureTable;

/// Bounded-concurrency dispatch loop for one phase.
///
/// The runner is the single reader of the job's outcome inbox; all phase
/// state (pending queue, failure table, result bag, in-flight count) is
/// owned here and dropped when the phase returns.
pub(crate) struct PhaseRunner<'a> {
    pub(crate) job: &'a str,
    pub(crate) phase: Phase,
    pub(crate) max_parallel: usize,
    pub(crate) max_failure_rate: usize,
    pub(crate) pool: &'a WorkerPool,
    pub(crate) events: &'a EventSink,
    pub(crate) oob: &'a OobStore,
    pub(crate) inbox: &'a mut mpsc::Receiver<TaskOutcome>,
}

impl PhaseRunner<'_> {
    pub(crate) async fn run(
        mut self,
        partitions: Vec<Partition>,
    ) -> Result<BTreeSet<String>, JobFailure> {
        let mut pending: VecDeque<usize> = partitions.iter().map(|p| p.id).collect();
        let mut failures = FailureTable::new(partitions);
        let mut results = BTreeSet::new();
        let mut in_flight = 0usize;

        loop {
            while in_flight < self.max_parallel {
                let Some(partition) = pending.pop_front() else {
                    break;
                };
                self.submit(partition, &failures).await?;
                in_flight += 1;
            }

            if in_flight == 0 {
                if pending.is_empty() {
                    debug!(
                        job = self.job,
                        phase = %self.phase,
                        results = results.len(),
                        "phase complete"
                    );
                    return Ok(results);
                }
                // Work remains but the dispatch gate never opened; there is
                // no outcome this loop could block on.
                self.event("ERROR: Nothing to wait".to_string(), None);
                return Err(JobFailure::Logged);
            }

            let Some(outcome) = self.inbox.recv().await else {
                return Err(JobFailure::Unexpected(
                    "task outcome stream closed".to_string(),
                ));
            };

            match outcome {
                TaskOutcome::Success {
                    partition,
                    node,
                    output,
                    oob_keys,
                } => {
                    debug!(
                        job = self.job,
                        phase = %self.phase,
                        partition,
                        node = %node,
                        "task ready"
                    );
                    self.event(
                        format!(
                            "Received results from {}:{} @ {}.",
                            self.phase, partition, node
                        ),
                        Some(EventTag::TaskReady { phase: self.phase }),
                    );
                    if !oob_keys.is_empty() {
                        self.oob.store(self.job, &node, oob_keys);
                    }
                    results.insert(output);
                    in_flight -= 1;
                }
                TaskOutcome::DataError {
                    partition,
                    node,
                    failed_uri,
                } => {
                    if partition >= failures.len() {
                        self.event(
                            format!(
                                "ERROR: Received an unknown error: data error for unknown partition {partition}"
                            ),
                            None,
                        );
                        return Err(JobFailure::Logged);
                    }
                    // The rate check reads the blacklist as it stood when
                    // the error arrived, before the new node is recorded.
                    let failed = failures.blacklist_len(partition);
                    if failed > self.max_failure_rate {
                        self.event(
                            format!(
                                "ERROR: {}:{} failed {} times. Aborting job.",
                                self.phase, partition, failed
                            ),
                            None,
                        );
                        return Err(JobFailure::Logged);
                    }
                    warn!(
                        job = self.job,
                        phase = %self.phase,
                        partition,
                        node = %node,
                        uri = %failed_uri,
                        "data error, rescheduling"
                    );
                    failures.on_data_error(partition, &failed_uri, node);
                    // One task ended and its replacement starts right away:
                    // the retry never re-enters the pending queue and the
                    // in-flight count stays put.
                    self.submit(partition, &failures).await?;
                }
                TaskOutcome::JobError { partition, node } => {
                    // Already described to the event sink by the worker side.
                    debug!(
                        job = self.job,
                        phase = %self.phase,
                        partition,
                        node = %node,
                        "job error reported by worker"
                    );
                    return Err(JobFailure::Logged);
                }
                TaskOutcome::WorkerCrashed {
                    partition,
                    node,
                    reason,
                } => {
                    self.event(
                        format!(
                            "ERROR: Worker crashed in {}:{} @ {}: {}",
                            self.phase, partition, node, reason
                        ),
                        None,
                    );
                    return Err(JobFailure::Logged);
                }
                TaskOutcome::MasterError { reason } => {
                    self.event(
                        format!("ERROR: Master terminated the job: {reason}"),
                        None,
                    );
                    return Err(JobFailure::Logged);
                }
                TaskOutcome::Unknown { payload } => {
                    self.event(
                        format!("ERROR: Received an unknown error: {payload}"),
                        None,
                    );
                    return Err(JobFailure::Logged);
                }
            }
        }
    }

    async fn submit(&self, partition: usize, failures: &FailureTable) -> Result<(), JobFailure> {
        let request = TaskRequest {
            job: self.job.to_string(),
            partition,
            phase: self.phase,
            excluded_nodes: failures.blacklist(partition).to_vec(),
            inputs: failures.remaining_inputs(partition).to_vec(),
        };
        self.pool
            .submit(request)
            .await
            .map_err(|err| JobFailure::Unexpected(format!("{err:#}")))
    }

    fn event(&self, message: String, tag: Option<EventTag>) {
        self.events.emit(JobEvent {
            job: self.job.to_string(),
            at: Utc::now(),
            message,
            tag,
        });
    }
}
