#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Per-job coordinator engine for the Gristmill map/reduce service.
//!
//! One spawned task per job drives the map and reduce phases across an
//! external worker pool with a bounded fan-out, absorbs retriable data
//! faults, and reports progress through a per-job event stream. The
//! collaborators (worker pool, event sink, OOB store, garbage collector)
//! are reached through channel seams; see [`clients`].

/// Public API types for the coordinator.
pub mod api;
/// Channel seams to the external collaborators.
pub mod clients;
/// HTTP bridge to an out-of-process worker-pool service.
pub mod remote;
/// Local event sink with per-job log persistence.
pub mod sink;

mod coordinator;
mod failure;
mod phase;

pub use api::{CoordinatorConfig, EventTag, JobEvent, JobFailure, TaskOutcome, TaskRequest};
pub use coordinator::{JobHandle, spawn_coordinator};
