use grist_core::taskset::{Partition, TaskInput};

/// Per-partition failure state for one phase.
///
/// Owned by the phase runner that created it and dropped when the phase
/// returns. Partition ids are dense and positional, so records live in a
/// plain vector.
#[derive(Debug)]
pub(crate) struct FailureTable {
    records: Vec<FailureRecord>,
}

#[derive(Debug)]
struct FailureRecord {
    blacklist: Vec<String>,
    remaining: Vec<TaskInput>,
}

impl FailureTable {
    pub(crate) fn new(partitions: Vec<Partition>) -> Self {
        let records = partitions
            .into_iter()
            .map(|partition| FailureRecord {
                blacklist: Vec::new(),
                remaining: partition.variants,
            })
            .collect();
        Self { records }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn blacklist(&self, partition: usize) -> &[String] {
        &self.records[partition].blacklist
    }

    pub(crate) fn remaining_inputs(&self, partition: usize) -> &[TaskInput] {
        &self.records[partition].remaining
    }

    pub(crate) fn blacklist_len(&self, partition: usize) -> usize {
        self.records[partition].blacklist.len()
    }

    /// Record a data error: blacklist the node and drop the failed input
    /// variant, unless that would leave the partition with nothing to retry.
    pub(crate) fn on_data_error(&mut self, partition: usize, failed_uri: &str, node: String) {
        let record = &mut self.records[partition];
        if !record.blacklist.contains(&node) {
            record.blacklist.push(node);
        }
        if record.remaining.len() > 1 {
            let kept: Vec<TaskInput> = record
                .remaining
                .iter()
                .filter(|input| input.uri != failed_uri)
                .cloned()
                .collect();
            // A partition must always keep at least one input; as a last
            // resort the failed URI is retried on another node.
            if !kept.is_empty() {
                record.remaining = kept;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(uris: &[&str]) -> FailureTable {
        FailureTable::new(vec![Partition {
            id: 0,
            variants: uris.iter().map(|uri| TaskInput::new(uri)).collect(),
        }])
    }

    fn remaining_uris(table: &FailureTable) -> Vec<&str> {
        table
            .remaining_inputs(0)
            .iter()
            .map(|input| input.uri.as_str())
            .collect()
    }

    #[test]
    fn blacklist_grows_in_arrival_order_without_duplicates() {
        let mut table = table(&["u1"]);
        table.on_data_error(0, "u1", "n1".to_string());
        table.on_data_error(0, "u1", "n2".to_string());
        table.on_data_error(0, "u1", "n1".to_string());
        assert_eq!(table.blacklist(0), ["n1".to_string(), "n2".to_string()]);
        assert_eq!(table.blacklist_len(0), 2);
    }

    #[test]
    fn prunes_the_failed_variant_when_alternatives_remain() {
        let mut table = table(&["u1", "u2", "u3"]);
        table.on_data_error(0, "u2", "n1".to_string());
        assert_eq!(remaining_uris(&table), ["u1", "u3"]);
    }

    #[test]
    fn keeps_the_sole_variant_for_a_last_resort_retry() {
        let mut table = table(&["u1"]);
        table.on_data_error(0, "u1", "n1".to_string());
        table.on_data_error(0, "u1", "n2".to_string());
        assert_eq!(remaining_uris(&table), ["u1"]);
    }

    #[test]
    fn keeps_the_set_when_every_variant_matches_the_failed_uri() {
        let mut table = table(&["u1", "u1"]);
        table.on_data_error(0, "u1", "n1".to_string());
        assert_eq!(remaining_uris(&table), ["u1", "u1"]);
    }

    #[test]
    fn records_are_independent_per_partition() {
        let mut table = FailureTable::new(vec![
            Partition {
                id: 0,
                variants: vec![TaskInput::new("a1"), TaskInput::new("a2")],
            },
            Partition {
                id: 1,
                variants: vec![TaskInput::new("b1")],
            },
        ]);
        table.on_data_error(0, "a1", "n1".to_string());
        assert_eq!(table.blacklist_len(0), 1);
        assert_eq!(table.blacklist_len(1), 0);
        assert_eq!(table.remaining_inputs(1).len(), 1);
    }
}
