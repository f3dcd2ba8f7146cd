use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Job names end up as path components and event-log file names downstream.
const FORBIDDEN_NAME_CHARS: [char; 2] = ['/', '.'];

/// A parsed job submission, immutable for the lifetime of the job.
///
/// The ingress validates and persists the submission before a coordinator is
/// spawned for it; the coordinator itself trusts the descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Unique job name. Uniqueness is enforced by the ingress.
    pub name: String,
    /// Ordered inputs, one map partition each.
    pub inputs: Vec<InputSpec>,
    /// Maximum concurrent map tasks. `0` disables the map phase and the raw
    /// inputs flow straight into reduce.
    pub map_parallel: usize,
    /// Maximum concurrent reduce tasks.
    pub reduce_parallel: usize,
    /// Whether to run the reduce phase. When unset, map outputs are the final
    /// result.
    #[serde(default)]
    pub do_reduce: bool,
}

/// One input: a single URI, or an ordered list of redundant replicas.
///
/// Replica lists are accepted by the map phase only; reduce rejects them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InputSpec {
    /// A single input URI.
    Single(String),
    /// Interchangeable replicas of the same input, in preference order.
    Replicas(Vec<String>),
}

impl InputSpec {
    /// All replica URIs carried by the spec, singletons included.
    pub fn replicas(&self) -> &[String] {
        match self {
            InputSpec::Single(uri) => std::slice::from_ref(uri),
            InputSpec::Replicas(uris) => uris,
        }
    }

    /// Whether the spec carries a replica list.
    pub fn is_redundant(&self) -> bool {
        matches!(self, InputSpec::Replicas(_))
    }

    /// The first replica, if any.
    pub fn primary(&self) -> Option<&str> {
        self.replicas().first().map(String::as_str)
    }
}

/// A constraint violation in a job submission, caught at the ingress.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum JobValidationError {
    /// The job name is empty.
    #[error("job name must not be empty")]
    EmptyName,
    /// The job name contains a character that is unsafe downstream.
    #[error("job name must not contain {0:?}")]
    ForbiddenNameCharacter(char),
    /// An input's replica list has no entries.
    #[error("input {0} has an empty replica list")]
    EmptyReplicaList(usize),
    /// A reduce phase was requested with no task slots.
    #[error("reduce_parallel must be at least 1 when do_reduce is set")]
    ZeroReduceParallel,
}

/// Check the job-name constraint: non-empty, no `/`, no `.`.
pub fn validate_job_name(name: &str) -> Result<(), JobValidationError> {
    if name.is_empty() {
        return Err(JobValidationError::EmptyName);
    }
    for ch in FORBIDDEN_NAME_CHARS {
        if name.contains(ch) {
            return Err(JobValidationError::ForbiddenNameCharacter(ch));
        }
    }
    Ok(())
}

impl JobDescriptor {
    /// Load a descriptor from the JSON job file the ingress persisted.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read job file: {}", path.display()))?;
        let descriptor: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse job file: {}", path.display()))?;
        Ok(descriptor)
    }

    /// Ingress-side validation of the submission shape.
    ///
    /// The coordinator assumes these constraints hold; run this before
    /// spawning one.
    pub fn validate(&self) -> Result<(), JobValidationError> {
        validate_job_name(&self.name)?;
        for (position, spec) in self.inputs.iter().enumerate() {
            if spec.replicas().is_empty() {
                return Err(JobValidationError::EmptyReplicaList(position));
            }
        }
        if self.do_reduce && self.reduce_parallel == 0 {
            return Err(JobValidationError::ZeroReduceParallel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> JobDescriptor {
        JobDescriptor {
            name: name.to_string(),
            inputs: vec![InputSpec::Single("http://h1/a".to_string())],
            map_parallel: 1,
            reduce_parallel: 1,
            do_reduce: false,
        }
    }

    #[test]
    fn parses_mixed_inputs_from_json() {
        let raw = r#"{
            "name": "wordcount",
            "inputs": ["http://h1/a", ["disco://h2/b", "disco://h3/b"]],
            "map_parallel": 4,
            "reduce_parallel": 2,
            "do_reduce": true
        }"#;
        let parsed: JobDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.name, "wordcount");
        assert_eq!(
            parsed.inputs,
            vec![
                InputSpec::Single("http://h1/a".to_string()),
                InputSpec::Replicas(vec![
                    "disco://h2/b".to_string(),
                    "disco://h3/b".to_string(),
                ]),
            ]
        );
        assert!(parsed.do_reduce);
    }

    #[test]
    fn do_reduce_defaults_to_off() {
        let raw = r#"{"name": "j", "inputs": [], "map_parallel": 0, "reduce_parallel": 1}"#;
        let parsed: JobDescriptor = serde_json::from_str(raw).unwrap();
        assert!(!parsed.do_reduce);
    }

    #[test]
    fn replicas_of_a_singleton_is_one_uri() {
        let spec = InputSpec::Single("u".to_string());
        assert_eq!(spec.replicas(), ["u".to_string()]);
        assert!(!spec.is_redundant());
        assert_eq!(spec.primary(), Some("u"));
    }

    #[test]
    fn name_validation_rejects_path_characters() {
        assert_eq!(validate_job_name(""), Err(JobValidationError::EmptyName));
        assert_eq!(
            validate_job_name("a/b"),
            Err(JobValidationError::ForbiddenNameCharacter('/'))
        );
        assert_eq!(
            validate_job_name("a.b"),
            Err(JobValidationError::ForbiddenNameCharacter('.'))
        );
        assert_eq!(validate_job_name("job_1@node"), Ok(()));
    }

    #[test]
    fn validate_rejects_empty_replica_lists() {
        let mut bad = descriptor("j1");
        bad.inputs.push(InputSpec::Replicas(Vec::new()));
        assert_eq!(bad.validate(), Err(JobValidationError::EmptyReplicaList(1)));
    }

    #[test]
    fn validate_rejects_zero_reduce_slots() {
        let mut bad = descriptor("j2");
        bad.do_reduce = true;
        bad.reduce_parallel = 0;
        assert_eq!(bad.validate(), Err(JobValidationError::ZeroReduceParallel));
    }
}
