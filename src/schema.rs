//! Output schema definitions for query results and profile snapshots.
//!
//! These are the structures written to disk and returned by the facade.
//! The snapshot is versioned so older files can be rejected cleanly.

use crate::stats::{ExecStats, OperationRecord};
use crate::utils::config::SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of a graph or scope result tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNodeProfile {
    /// Operation name, scope path, op type, "_root" or "_others"
    pub name: String,

    /// Op type of the operation at this node, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_type: Option<String>,

    /// Statistics of this node alone
    pub self_stats: ExecStats,

    /// Statistics of this node and everything under it
    pub total_stats: ExecStats,

    /// Number of nodes folded into this one ("_others" only)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub collapsed: usize,

    /// Children ordered by the query's metric
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GraphNodeProfile>,
}

impl GraphNodeProfile {
    pub fn is_others(&self) -> bool {
        self.name == crate::utils::config::OTHERS_NODE_NAME
    }

    /// Sum of self stats over this node and every descendant shown
    pub fn visible_self_total(&self) -> ExecStats {
        let mut total = ExecStats::default();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += node.self_stats;
            stack.extend(node.children.iter());
        }
        total
    }

    /// Number of nodes in the shown tree, this one included
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth-first search by name
    pub fn find(&self, name: &str) -> Option<&GraphNodeProfile> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.name == name {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }
}

/// Result of an operation-type query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiNodeProfile {
    /// Always "_root"
    pub name: String,

    /// Sum over every bucket
    pub total_stats: ExecStats,

    /// One node per op type; member operations are its children
    pub op_types: Vec<GraphNodeProfile>,
}

impl MultiNodeProfile {
    pub fn bucket(&self, op_type: &str) -> Option<&GraphNodeProfile> {
        self.op_types.iter().find(|b| b.name == op_type)
    }
}

/// Any query result, tagged by view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ProfileResult {
    Graph(GraphNodeProfile),
    Scope(GraphNodeProfile),
    Operations(MultiNodeProfile),
}

impl ProfileResult {
    pub fn total_stats(&self) -> ExecStats {
        match self {
            ProfileResult::Graph(root) | ProfileResult::Scope(root) => root.total_stats,
            ProfileResult::Operations(table) => table.total_stats,
        }
    }
}

/// Serialized profiler state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the snapshot was generated (RFC 3339)
    pub generated_at: String,

    /// Step key -> number of traces ingested under it
    #[serde(default)]
    pub steps: BTreeMap<i64, usize>,

    /// Every operation record, sorted by name
    pub operations: Vec<OperationRecord>,
}

impl ProfileSnapshot {
    pub fn new(steps: BTreeMap<i64, usize>, operations: Vec<OperationRecord>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            steps,
            operations,
        }
    }
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}
