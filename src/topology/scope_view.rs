//! Name-scope trie.
//!
//! Every slash-delimited prefix of an operation's scope gets a node. The
//! operation itself sits on the node of its full scope; prefixes without an
//! operation are pure scopes.

use crate::stats::Snapshot;
use crate::utils::config::{ROOT_NODE_NAME, SCOPE_DELIMITER};
use log::{debug, warn};
use std::collections::HashMap;

/// One trie node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeNode {
    /// Full path from the root ("" for the root itself)
    pub path: String,

    /// Last path segment
    pub segment: String,

    /// Arena index of the operation living at this path
    pub op: Option<usize>,

    /// Child trie nodes, sorted by segment
    pub children: Vec<usize>,
}

impl ScopeNode {
    fn new(path: String, segment: String) -> Self {
        Self {
            path,
            segment,
            op: None,
            children: Vec::new(),
        }
    }
}

/// Scope view; node 0 is the synthetic root
#[derive(Debug, Clone)]
pub struct ScopeView {
    nodes: Vec<ScopeNode>,
}

impl ScopeView {
    pub const ROOT: usize = 0;

    pub fn build(snapshot: &Snapshot) -> Self {
        let mut nodes = vec![ScopeNode::new(String::new(), ROOT_NODE_NAME.to_string())];
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for (op, record) in snapshot.records.iter().enumerate() {
            let mut parent = Self::ROOT;
            let mut path = String::new();

            for segment in record.def.scope_path().split(SCOPE_DELIMITER) {
                if !path.is_empty() {
                    path.push(SCOPE_DELIMITER);
                }
                path.push_str(segment);

                parent = match lookup.get(&path) {
                    Some(&existing) => existing,
                    None => {
                        let created = nodes.len();
                        nodes.push(ScopeNode::new(path.clone(), segment.to_string()));
                        nodes[parent].children.push(created);
                        lookup.insert(path.clone(), created);
                        created
                    }
                };
            }

            match nodes[parent].op {
                // The store rejects shared scopes, so this only fires on hand-built snapshots
                Some(other) => warn!(
                    "Operations {} and {} share scope {}; keeping the first",
                    snapshot.records[other].name(),
                    record.name(),
                    path
                ),
                None => nodes[parent].op = Some(op),
            }
        }

        let segments: Vec<String> = nodes.iter().map(|n| n.segment.clone()).collect();
        for node in &mut nodes {
            node.children.sort_by(|a, b| segments[*a].cmp(&segments[*b]));
        }

        debug!("Scope view: {} trie nodes", nodes.len());

        Self { nodes }
    }

    pub fn root(&self) -> &ScopeNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, index: usize) -> &ScopeNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::graph_def::OpDef;
    use crate::stats::OperationRecord;
    use std::collections::BTreeMap;

    fn view(ops: Vec<OpDef>) -> (Snapshot, ScopeView) {
        let snapshot = Snapshot::new(
            0,
            ops.into_iter().map(OperationRecord::new).collect(),
            BTreeMap::new(),
        );
        let view = ScopeView::build(&snapshot);
        (snapshot, view)
    }

    fn find(view: &ScopeView, path: &str) -> Option<usize> {
        path.split(SCOPE_DELIMITER).try_fold(ScopeView::ROOT, |current, segment| {
            view.node(current)
                .children
                .iter()
                .copied()
                .find(|&child| view.node(child).segment == segment)
        })
    }

    #[test]
    fn test_trie_shape() {
        let (snapshot, view) = view(vec![
            OpDef::new("dense/matmul", "MatMul"),
            OpDef::new("dense/bias", "Add"),
            OpDef::new("dense", "Identity"),
            OpDef::new("loss", "Mean"),
            OpDef::new("x", "Relu").with_scope("act/relu"),
        ]);

        let root = view.root();
        let top: Vec<&str> = root
            .children
            .iter()
            .map(|&c| view.node(c).segment.as_str())
            .collect();
        assert_eq!(top, vec!["act", "dense", "loss"]);

        let dense = find(&view, "dense").unwrap();
        assert_eq!(view.node(dense).op, snapshot.index_of("dense"));
        assert_eq!(view.node(dense).children.len(), 2);

        // "act" has no operation of its own
        let act = find(&view, "act").unwrap();
        assert_eq!(view.node(act).op, None);
        let relu = find(&view, "act/relu").unwrap();
        assert_eq!(view.node(relu).op, snapshot.index_of("x"));

        assert_eq!(find(&view, "act/missing"), None);
    }

    #[test]
    fn test_empty_view() {
        let (_, view) = view(Vec::new());
        assert!(view.is_empty());
        assert_eq!(view.root().segment, ROOT_NODE_NAME);
    }
}
