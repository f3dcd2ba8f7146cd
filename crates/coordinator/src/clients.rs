//! Channel seams to the coordinator's external collaborators.
//!
//! Each collaborator is reached through a handle wrapping the sending side
//! of a channel; the receiving side is consumed by whatever implements the
//! collaborator: the [`crate::remote`] bridge and [`crate::sink`] task in
//! production, scripted tasks in tests.

use tokio::sync::{mpsc, oneshot};

use crate::api::{JobEvent, TaskRequest};

/// Request stream consumed by the worker-pool dispatcher.
#[derive(Debug)]
pub enum PoolRequest {
    /// Dispatch one task to a worker node.
    Submit(TaskRequest),
    /// Stop all outstanding tasks for a job. Late outcomes, if any, are
    /// dropped by the departed coordinator.
    KillJob {
        /// Job name.
        job: String,
    },
}

/// Handle through which the coordinator reaches the worker-pool dispatcher.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    tx: mpsc::Sender<PoolRequest>,
}

impl WorkerPool {
    /// Default capacity of the request channel.
    pub const DEFAULT_CAPACITY: usize = 16;

    /// Create a pool handle and the request stream its dispatcher consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PoolRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Submit one task. A completed send is the dispatcher's acknowledgement
    /// that the request was accepted; the task itself runs asynchronously
    /// and reports back through the job's outcome inbox.
    pub async fn submit(&self, request: TaskRequest) -> anyhow::Result<()> {
        self.tx
            .send(PoolRequest::Submit(request))
            .await
            .map_err(|_| anyhow::anyhow!("worker pool is unavailable"))
    }

    /// Ask the dispatcher to stop all outstanding tasks for `job`.
    pub async fn kill_job(&self, job: &str) {
        let _ = self
            .tx
            .send(PoolRequest::KillJob {
                job: job.to_string(),
            })
            .await;
    }
}

/// Request stream consumed by the event sink.
#[derive(Debug)]
pub enum EventRequest {
    /// Record one event.
    Emit(JobEvent),
    /// Finalize the event log for a terminated job.
    Flush {
        /// Job name.
        job: String,
        /// Acknowledged once the log is finalized.
        done: oneshot::Sender<()>,
    },
}

/// Handle through which the coordinator reaches the event sink.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EventRequest>,
}

impl EventSink {
    /// Create a sink handle and the request stream the sink consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EventRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Record one event. Never blocks; a departed sink drops the event.
    pub fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(EventRequest::Emit(event));
    }

    /// Finalize the log for `job`, waiting for the sink's acknowledgement.
    /// Returns immediately if the sink is gone.
    pub async fn flush(&self, job: &str) {
        let (done, ack) = oneshot::channel();
        if self
            .tx
            .send(EventRequest::Flush {
                job: job.to_string(),
                done,
            })
            .is_err()
        {
            return;
        }
        let _ = ack.await;
    }
}

/// One task's out-of-band keys, forwarded to the OOB store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OobRecord {
    /// Job name.
    pub job: String,
    /// Node that produced the keys.
    pub node: String,
    /// Key names. Replayed tasks may deliver the same keys again;
    /// at-least-once is accepted.
    pub keys: Vec<String>,
}

/// Handle through which the coordinator reaches the out-of-band store.
#[derive(Debug, Clone)]
pub struct OobStore {
    tx: mpsc::UnboundedSender<OobRecord>,
}

impl OobStore {
    /// Create a store handle and the record stream the store consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OobRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Forward one task's OOB keys. Fire-and-forget; failures never affect
    /// the job outcome.
    pub fn store(&self, job: &str, node: &str, keys: Vec<String>) {
        let _ = self.tx.send(OobRecord {
            job: job.to_string(),
            node: node.to_string(),
            keys,
        });
    }
}

/// Reclamation request consumed by the garbage collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcRequest {
    /// Intermediate map outputs to reclaim.
    pub map_outputs: Vec<String>,
}

/// Handle through which the coordinator reaches the garbage collector.
#[derive(Debug, Clone)]
pub struct Gc {
    tx: mpsc::UnboundedSender<GcRequest>,
}

impl Gc {
    /// Create a collector handle and the request stream it consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GcRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Reclaim intermediate map outputs once the reduce outputs exist.
    /// Best-effort.
    pub fn remove_map_results(&self, map_outputs: Vec<String>) {
        let _ = self.tx.send(GcRequest { map_outputs });
    }
}

/// The coordinator's external collaborators, bundled for spawning.
#[derive(Debug, Clone)]
pub struct JobClients {
    /// Worker-pool dispatcher.
    pub pool: WorkerPool,
    /// Per-job event sink.
    pub events: EventSink,
    /// Out-of-band key store.
    pub oob: OobStore,
    /// Intermediate-result garbage collector.
    pub gc: Gc,
}
