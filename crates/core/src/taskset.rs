use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::InputSpec;
use crate::locality::pref_host;

/// The two phases a job can run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// The map phase.
    Map,
    /// The reduce phase.
    Reduce,
}

impl Phase {
    /// The phase tag as it appears in events and task requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Map => "map",
            Phase::Reduce => "reduce",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input variant of a partition, with its locality hint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskInput {
    /// Input URI handed to the worker.
    pub uri: String,
    /// Preferred worker host, when the URI names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pref_host: Option<String>,
}

impl TaskInput {
    /// Build an input from a URI, deriving the locality hint.
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            pref_host: pref_host(uri),
        }
    }
}

/// A unit of work in one phase: a dense id and one or more interchangeable
/// input variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Partition {
    /// Dense partition id; assignment is input position.
    pub id: usize,
    /// Input variants, in preference order. Only one is consumed per
    /// successful task.
    pub variants: Vec<TaskInput>,
}

/// Rejection of a task-set construction.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TaskSetError {
    /// Reduce partitions fetch every input; replica lists are ambiguous
    /// there and the submission must resolve them first.
    #[error("Reduce doesn't support redundant inputs")]
    RedundantReduceInput,
}

/// Build the map task set: one partition per input at its position, one
/// variant per replica.
pub fn map_task_set(inputs: &[InputSpec]) -> Vec<Partition> {
    inputs
        .iter()
        .enumerate()
        .map(|(id, spec)| Partition {
            id,
            variants: spec.replicas().iter().map(|uri| TaskInput::new(uri)).collect(),
        })
        .collect()
}

/// Build the reduce task set: one partition per input, each carrying the
/// whole input set as a single quoted, space-joined URI.
///
/// Every reduce task fetches every input, so the synthetic URI is shared;
/// the locality hint stays per-partition and is best-effort.
pub fn reduce_task_set(inputs: &[InputSpec]) -> Result<Vec<Partition>, TaskSetError> {
    if inputs.iter().any(InputSpec::is_redundant) {
        return Err(TaskSetError::RedundantReduceInput);
    }

    let joined: String = inputs
        .iter()
        .flat_map(InputSpec::replicas)
        .map(|uri| format!("'{uri}' "))
        .collect();

    Ok(inputs
        .iter()
        .enumerate()
        .map(|(id, spec)| Partition {
            id,
            variants: vec![TaskInput {
                uri: joined.clone(),
                pref_host: spec.primary().and_then(pref_host),
            }],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(uri: &str) -> InputSpec {
        InputSpec::Single(uri.to_string())
    }

    #[test]
    fn map_preserves_partition_count_and_order() {
        let inputs = vec![single("http://h1/a"), single("http://h2/b"), single("raw")];
        let partitions = map_task_set(&inputs);
        assert_eq!(partitions.len(), inputs.len());
        for (position, partition) in partitions.iter().enumerate() {
            assert_eq!(partition.id, position);
        }
    }

    #[test]
    fn map_wraps_singletons_as_one_variant() {
        let partitions = map_task_set(&[single("disco://n1/x")]);
        assert_eq!(
            partitions[0].variants,
            vec![TaskInput {
                uri: "disco://n1/x".to_string(),
                pref_host: Some("n1".to_string()),
            }]
        );
    }

    #[test]
    fn map_expands_replicas_with_their_own_hints() {
        let inputs = vec![InputSpec::Replicas(vec![
            "disco://n1/x".to_string(),
            "http://n2/x".to_string(),
            "raw-blob".to_string(),
        ])];
        let partitions = map_task_set(&inputs);
        let hints: Vec<Option<String>> = partitions[0]
            .variants
            .iter()
            .map(|v| v.pref_host.clone())
            .collect();
        assert_eq!(
            hints,
            vec![Some("n1".to_string()), Some("n2".to_string()), None]
        );
    }

    #[test]
    fn reduce_rejects_replica_lists() {
        let inputs = vec![
            InputSpec::Replicas(vec!["u1".to_string(), "u2".to_string()]),
            single("u3"),
        ];
        assert_eq!(
            reduce_task_set(&inputs),
            Err(TaskSetError::RedundantReduceInput)
        );
    }

    #[test]
    fn reduce_joins_all_inputs_into_one_quoted_variant() {
        let inputs = vec![single("http://h1/a"), single("disco://h2/b")];
        let partitions = reduce_task_set(&inputs).unwrap();
        assert_eq!(partitions.len(), 2);
        for partition in &partitions {
            assert_eq!(partition.variants.len(), 1);
            assert_eq!(partition.variants[0].uri, "'http://h1/a' 'disco://h2/b' ");
        }
        assert_eq!(partitions[0].variants[0].pref_host, Some("h1".to_string()));
        assert_eq!(partitions[1].variants[0].pref_host, Some("h2".to_string()));
    }

    #[test]
    fn reduce_of_nothing_is_empty() {
        assert_eq!(reduce_task_set(&[]), Ok(Vec::new()));
    }

    #[test]
    fn phase_tags_match_the_wire() {
        assert_eq!(Phase::Map.to_string(), "map");
        assert_eq!(Phase::Reduce.to_string(), "reduce");
        assert_eq!(serde_json::to_string(&Phase::Reduce).unwrap(), "\"reduce\"");
    }
}
