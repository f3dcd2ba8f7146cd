//! Public API types for the Gristmill job coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use grist_core::job::InputSpec;
use grist_core::taskset::{Phase, TaskInput};

/// Tuning knobs for a job coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Per-partition node failures tolerated before the job aborts.
    ///
    /// The check is strict: a partition aborts the job when its blacklist
    /// already *exceeds* this value as another data error arrives, so the
    /// default of 3 tolerates four failing nodes.
    pub max_failure_rate: usize,
}

impl CoordinatorConfig {
    /// Default failure-rate bound.
    pub const DEFAULT_MAX_FAILURE_RATE: usize = 3;
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_failure_rate: Self::DEFAULT_MAX_FAILURE_RATE,
        }
    }
}

/// A task dispatch request posted to the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRequest {
    /// Job name.
    pub job: String,
    /// Partition the task computes.
    pub partition: usize,
    /// Phase the partition belongs to.
    pub phase: Phase,
    /// Nodes this partition must not be scheduled on.
    pub excluded_nodes: Vec<String>,
    /// Input variants still considered valid for the partition.
    pub inputs: Vec<TaskInput>,
}

/// Outcome message posted by the worker pool.
///
/// Exactly one outcome arrives per accepted submission under normal
/// operation; anything the pool sends outside this protocol surfaces as
/// [`TaskOutcome::Unknown`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task completed and produced an output.
    Success {
        /// Partition id.
        partition: usize,
        /// Node that ran the task.
        node: String,
        /// Output URI.
        output: String,
        /// Out-of-band keys emitted by the task, if any.
        #[serde(default)]
        oob_keys: Vec<String>,
    },
    /// An input could not be read on the node; retriable on another
    /// node or variant.
    DataError {
        /// Partition id.
        partition: usize,
        /// Node the read failed on.
        node: String,
        /// The input URI that failed.
        failed_uri: String,
    },
    /// The task failed terminally; the worker side already described the
    /// failure to the event sink.
    JobError {
        /// Partition id.
        partition: usize,
        /// Node the task ran on.
        node: String,
    },
    /// The worker process died.
    WorkerCrashed {
        /// Partition id.
        partition: usize,
        /// Node the worker ran on.
        node: String,
        /// Crash detail.
        reason: String,
    },
    /// The pool terminated the job.
    MasterError {
        /// Termination detail.
        reason: String,
    },
    /// A message outside the protocol, carried verbatim.
    Unknown {
        /// The unrecognized payload.
        payload: String,
    },
}

/// One named event in a job's event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobEvent {
    /// Job the event belongs to.
    pub job: String,
    /// When the coordinator recorded the event.
    pub at: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable tag, for the events pollers key off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<EventTag>,
}

/// Machine-readable tags attached to the compatibility-relevant events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventTag {
    /// The coordinator came up.
    Start {
        /// Coordinator task id.
        coordinator: String,
    },
    /// Job parameters, as accepted.
    JobData {
        /// Maximum concurrent map tasks.
        map_parallel: usize,
        /// Maximum concurrent reduce tasks.
        reduce_parallel: usize,
        /// Whether a reduce phase was requested.
        do_reduce: bool,
        /// The submitted inputs.
        inputs: Vec<InputSpec>,
    },
    /// One partition's results arrived.
    TaskReady {
        /// Phase the partition belongs to.
        phase: Phase,
    },
    /// Terminal success, carrying the final output set.
    Ready {
        /// Final results: reduce outputs if reduce ran, map outputs or raw
        /// inputs otherwise.
        results: Vec<InputSpec>,
    },
}

/// Terminal failure of a job coordinator.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum JobFailure {
    /// The fault was already described to the event sink before the
    /// coordinator unwound.
    #[error("job terminated due to the previous errors")]
    Logged,
    /// A fault outside the protocol; the detail reaches the event sink on
    /// the way out.
    #[error("{0}")]
    Unexpected(String),
}
