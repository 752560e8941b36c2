//! Operation-type buckets.

use crate::stats::Snapshot;
use log::debug;
use std::collections::BTreeMap;

/// Operations grouped by exact op type
#[derive(Debug, Clone, Default)]
pub struct TypeView {
    buckets: BTreeMap<String, Vec<usize>>,
}

impl TypeView {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, record) in snapshot.records.iter().enumerate() {
            buckets.entry(record.op_type().to_string()).or_default().push(i);
        }

        debug!("Type view: {} op types", buckets.len());
        Self { buckets }
    }

    /// Op type -> member arena indices (ascending by operation name)
    pub fn buckets(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::graph_def::OpDef;
    use crate::stats::OperationRecord;

    #[test]
    fn test_buckets_are_exact_match() {
        let snapshot = Snapshot::new(
            0,
            vec![
                OperationRecord::new(OpDef::new("b", "MatMul")),
                OperationRecord::new(OpDef::new("a", "MatMul")),
                OperationRecord::new(OpDef::new("c", "matmul")),
            ],
            BTreeMap::new(),
        );
        let view = TypeView::build(&snapshot);

        assert_eq!(view.buckets().len(), 2);
        assert_eq!(view.buckets()["MatMul"], vec![0, 1]);
        assert_eq!(view.buckets()["matmul"], vec![2]);
        assert!(!view.buckets().contains_key("Conv2D"));
    }
}
