use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use grist_core::job::{InputSpec, JobDescriptor};
use grist_core::taskset::{Partition, Phase, map_task_set, reduce_task_set};

use crate::api::{CoordinatorConfig, EventTag, JobEvent, JobFailure, TaskOutcome};
use crate::clients::JobClients;
use crate::phase::PhaseRunner;

static COORDINATOR_SEQ: AtomicU64 = AtomicU64::new(1);

/// Handle to a spawned per-job coordinator.
#[derive(Debug)]
pub struct JobHandle {
    started: Option<oneshot::Receiver<String>>,
    join: JoinHandle<Result<Vec<InputSpec>, JobFailure>>,
}

impl JobHandle {
    /// Wait for the coordinator's startup ack, yielding its id.
    ///
    /// The spawner is expected to bound this wait; the ingress treats a
    /// missing ack as a failed job start. Returns `None` if the ack was
    /// already consumed or the coordinator died before acknowledging.
    pub async fn started(&mut self) -> Option<String> {
        match self.started.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }

    /// Wait for the job to finish, yielding the final results.
    pub async fn wait(self) -> Result<Vec<InputSpec>, JobFailure> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(JobFailure::Unexpected(format!(
                "coordinator task join error: {err}"
            ))),
        }
    }
}

/// Spawn the coordinator task for one job.
///
/// `inbox` is the job's outcome stream: the worker pool posts exactly one
/// [`TaskOutcome`] per accepted submission into it. The coordinator runs to
/// completion independently of the spawner; dropping the handle does not
/// cancel the job.
pub fn spawn_coordinator(
    descriptor: JobDescriptor,
    config: CoordinatorConfig,
    clients: JobClients,
    inbox: mpsc::Receiver<TaskOutcome>,
) -> JobHandle {
    let (started_tx, started_rx) = oneshot::channel();
    let coordinator_id = format!(
        "coordinator-{}",
        COORDINATOR_SEQ.fetch_add(1, Ordering::Relaxed)
    );

    let coordinator = Coordinator {
        descriptor,
        config,
        clients,
        inbox,
        coordinator_id,
    };
    let join = tokio::spawn(coordinator.run(started_tx));

    JobHandle {
        started: Some(started_rx),
        join,
    }
}

struct Coordinator {
    descriptor: JobDescriptor,
    config: CoordinatorConfig,
    clients: JobClients,
    inbox: mpsc::Receiver<TaskOutcome>,
    coordinator_id: String,
}

impl Coordinator {
    fn event(&self, message: impl Into<String>, tag: Option<EventTag>) {
        self.clients.events.emit(JobEvent {
            job: self.descriptor.name.clone(),
            at: Utc::now(),
            message: message.into(),
            tag,
        });
    }

    async fn run(
        mut self,
        started: oneshot::Sender<String>,
    ) -> Result<Vec<InputSpec>, JobFailure> {
        // Ack the spawner before any phase work; the ingress gives up on the
        // job if this does not arrive in time.
        let _ = started.send(self.coordinator_id.clone());

        self.event(
            "Job coordinator starts",
            Some(EventTag::Start {
                coordinator: self.coordinator_id.clone(),
            }),
        );
        self.event(
            "Starting job",
            Some(EventTag::JobData {
                map_parallel: self.descriptor.map_parallel,
                reduce_parallel: self.descriptor.reduce_parallel,
                do_reduce: self.descriptor.do_reduce,
                inputs: self.descriptor.inputs.clone(),
            }),
        );

        let job = self.descriptor.name.clone();
        match self.drive().await {
            Ok(results) => {
                info!(job = %job, results = results.len(), "job ready");
                self.event(
                    "READY",
                    Some(EventTag::Ready {
                        results: results.clone(),
                    }),
                );
                self.clients.events.flush(&job).await;
                Ok(results)
            }
            Err(failure) => {
                match &failure {
                    JobFailure::Logged => {
                        self.event("Job terminated due to the previous errors", None);
                    }
                    JobFailure::Unexpected(detail) => {
                        self.event(
                            format!("ERROR: Job coordinator failed unexpectedly: {detail}"),
                            None,
                        );
                    }
                }
                self.clients.pool.kill_job(&job).await;
                self.clients.events.flush(&job).await;
                Err(failure)
            }
        }
    }

    async fn drive(&mut self) -> Result<Vec<InputSpec>, JobFailure> {
        let mut map_outputs = None;
        let reduce_inputs = if self.descriptor.map_parallel > 0 {
            self.event("Map phase", None);
            let partitions = map_task_set(&self.descriptor.inputs);
            let max_parallel = self.descriptor.map_parallel;
            let outputs = self.run_phase(Phase::Map, partitions, max_parallel).await?;
            self.event("Map phase done", None);

            let outputs: Vec<String> = outputs.into_iter().collect();
            let inputs = outputs.iter().cloned().map(InputSpec::Single).collect();
            map_outputs = Some(outputs);
            inputs
        } else {
            self.descriptor.inputs.clone()
        };

        if !self.descriptor.do_reduce {
            return Ok(reduce_inputs);
        }

        self.event("Starting reduce phase", None);
        let partitions = match reduce_task_set(&reduce_inputs) {
            Ok(partitions) => partitions,
            Err(err) => {
                self.event(format!("ERROR: {err}"), None);
                return Err(JobFailure::Unexpected(err.to_string()));
            }
        };
        let max_parallel = self.descriptor.reduce_parallel;
        let outputs = self
            .run_phase(Phase::Reduce, partitions, max_parallel)
            .await?;
        self.event("Reduce phase done", None);

        // Map intermediates are garbage once the reduce outputs exist.
        if let Some(intermediates) = map_outputs {
            self.clients.gc.remove_map_results(intermediates);
        }

        Ok(outputs.into_iter().map(InputSpec::Single).collect())
    }

    async fn run_phase(
        &mut self,
        phase: Phase,
        partitions: Vec<Partition>,
        max_parallel: usize,
    ) -> Result<BTreeSet<String>, JobFailure> {
        let runner = PhaseRunner {
            job: &self.descriptor.name,
            phase,
            max_parallel,
            max_failure_rate: self.config.max_failure_rate,
            pool: &self.clients.pool,
            events: &self.clients.events,
            oob: &self.clients.oob,
            inbox: &mut self.inbox,
        };
        runner.run(partitions).await
    }
}
