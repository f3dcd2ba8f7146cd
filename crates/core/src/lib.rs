#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Shared job-submission and task-set types for the Gristmill map/reduce
//! service.

/// Job descriptors, as delivered by the ingress.
pub mod job;
/// Locality hints derived from input URIs.
pub mod locality;
/// Per-phase task sets.
pub mod taskset;

pub use job::{InputSpec, JobDescriptor, JobValidationError};
pub use locality::pref_host;
pub use taskset::{Partition, Phase, TaskInput, TaskSetError, map_task_set, reduce_task_set};
