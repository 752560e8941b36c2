//! Graph definition input.
//!
//! A graph definition lists every operation of the traced dataflow graph
//! with its type, its inputs and (optionally) an explicit name scope.
//! It is supplied once, when the profiler is built.

use crate::utils::config::{CONTROL_INPUT_PREFIX, OUTPUT_PORT_SEPARATOR, SCOPE_DELIMITER};
use crate::utils::error::GraphError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A single operation declared by the graph definition (or first seen in a trace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpDef {
    /// Unique operation name
    pub name: String,

    /// Operation type (e.g. "MatMul")
    #[serde(alias = "op_type", alias = "type")]
    pub op: String,

    /// Input names as written by the producer ("x", "x:1", "^init")
    #[serde(default, alias = "input")]
    pub inputs: Vec<String>,

    /// Slash-delimited name scope; the operation name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Device the operation was placed on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl OpDef {
    pub fn new(name: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            inputs: Vec::new(),
            scope: None,
            device: None,
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Full name-scope path of this operation
    pub fn scope_path(&self) -> &str {
        self.scope.as_deref().unwrap_or(&self.name)
    }

    /// Producer operation names this operation reads from, deduplicated
    pub fn input_ops(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.inputs
            .iter()
            .map(|raw| normalize_input(raw))
            .filter(|name| !name.is_empty() && seen.insert(*name))
            .collect()
    }
}

/// Strip the control-dependency marker and the output port from an input name
///
/// `"^init"` -> `"init"`, `"dense/matmul:1"` -> `"dense/matmul"`.
/// A colon followed by anything other than digits is kept as part of the name.
pub fn normalize_input(raw: &str) -> &str {
    let name = raw.strip_prefix(CONTROL_INPUT_PREFIX).unwrap_or(raw);

    match name.rsplit_once(OUTPUT_PORT_SEPARATOR) {
        Some((base, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    }
}

/// Check that a scope path has no empty segment
///
/// Rejects "", "/a", "a/", and "a//b".
pub fn is_valid_scope(path: &str) -> bool {
    !path.is_empty() && path.split(SCOPE_DELIMITER).all(|segment| !segment.is_empty())
}

/// The whole graph definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDef {
    #[serde(default, alias = "node")]
    pub nodes: Vec<OpDef>,
}

impl GraphDef {
    pub fn new(nodes: Vec<OpDef>) -> Self {
        Self { nodes }
    }

    /// Parse a graph definition from JSON text
    ///
    /// Accepts either `{"nodes": [...]}` (or `"node"`) or a bare array of operations.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let graph = match value {
            serde_json::Value::Array(_) => Self::new(serde_json::from_value(value)?),
            other => serde_json::from_value(other)?,
        };

        debug!("Parsed graph definition with {} operations", graph.nodes.len());
        graph.validate()?;
        Ok(graph)
    }

    /// Check operation identity and name-scope consistency
    ///
    /// # Errors
    /// * `GraphError::DuplicateOperation` - two operations share a name
    /// * `GraphError::InvalidScope` - a scope path has an empty segment
    /// * `GraphError::DuplicateScope` - two operations share a full scope path
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut names = HashSet::with_capacity(self.nodes.len());
        let mut scopes: HashMap<&str, &str> = HashMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(GraphError::DuplicateOperation(node.name.clone()));
            }

            let scope = node.scope_path();
            if !is_valid_scope(scope) {
                return Err(GraphError::InvalidScope {
                    op: node.name.clone(),
                    scope: scope.to_string(),
                });
            }

            if let Some(first) = scopes.insert(scope, &node.name) {
                return Err(GraphError::DuplicateScope {
                    first: first.to_string(),
                    second: node.name.clone(),
                    scope: scope.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_input() {
        assert_eq!(normalize_input("x"), "x");
        assert_eq!(normalize_input("^init"), "init");
        assert_eq!(normalize_input("dense/matmul:1"), "dense/matmul");
        assert_eq!(normalize_input("^dense/matmul:12"), "dense/matmul");
        assert_eq!(normalize_input("odd:name"), "odd:name");
    }

    #[test]
    fn test_input_ops_dedup() {
        let op = OpDef::new("add", "Add").with_inputs(["x:0", "x:1", "^y"]);
        assert_eq!(op.input_ops(), vec!["x", "y"]);
    }

    #[test]
    fn test_scope_validity() {
        assert!(is_valid_scope("a"));
        assert!(is_valid_scope("a/b/c"));
        assert!(!is_valid_scope(""));
        assert!(!is_valid_scope("/a"));
        assert!(!is_valid_scope("a/"));
        assert!(!is_valid_scope("a//b"));
    }

    #[test]
    fn test_from_json_bare_array() {
        let graph = GraphDef::from_json(
            r#"[{"name": "a", "op": "Const"}, {"name": "b", "op_type": "Neg", "input": ["a"]}]"#,
        )
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[1].op, "Neg");
        assert_eq!(graph.nodes[1].inputs, vec!["a".to_string()]);
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let graph = GraphDef::new(vec![OpDef::new("a", "Const"), OpDef::new("a", "Neg")]);
        assert!(matches!(
            graph.validate(),
            Err(GraphError::DuplicateOperation(name)) if name == "a"
        ));
    }

    #[test]
    fn test_duplicate_scope_rejected() {
        let graph = GraphDef::new(vec![
            OpDef::new("a", "Const").with_scope("layer/x"),
            OpDef::new("b", "Const").with_scope("layer/x"),
        ]);
        assert!(matches!(graph.validate(), Err(GraphError::DuplicateScope { .. })));
    }

    #[test]
    fn test_invalid_scope_rejected() {
        let graph = GraphDef::new(vec![OpDef::new("layer//x", "Const")]);
        assert!(matches!(graph.validate(), Err(GraphError::InvalidScope { .. })));
    }
}
