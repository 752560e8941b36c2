//! Topology indexer.
//!
//! Three read-only views over the same snapshot arena:
//! - graph: operations under the operations that consume them
//! - scope: a trie over slash-delimited name scopes
//! - type: buckets keyed by op type
//!
//! Views are built lazily on first use and live as long as the snapshot.

pub mod graph_view;
pub mod scope_view;
pub mod type_view;

pub use graph_view::{BitSet, GraphView};
pub use scope_view::{ScopeNode, ScopeView};
pub use type_view::TypeView;

use crate::stats::Snapshot;
use crate::utils::error::OptionsError;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Which view a query runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Graph,
    Scope,
    Type,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Graph => "graph",
            ViewKind::Scope => "scope",
            ViewKind::Type => "op",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graph" => Ok(ViewKind::Graph),
            "scope" | "name_scope" => Ok(ViewKind::Scope),
            "op" | "type" | "operations" => Ok(ViewKind::Type),
            other => Err(OptionsError::UnknownView(other.to_string())),
        }
    }
}

/// A borrowed view, dispatched by tag
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    Graph(&'a GraphView),
    Scope(&'a ScopeView),
    Type(&'a TypeView),
}

impl View<'_> {
    pub fn kind(&self) -> ViewKind {
        match self {
            View::Graph(_) => ViewKind::Graph,
            View::Scope(_) => ViewKind::Scope,
            View::Type(_) => ViewKind::Type,
        }
    }
}

/// A snapshot plus its lazily built views
#[derive(Debug)]
pub struct IndexedSnapshot {
    snapshot: Snapshot,
    graph: OnceLock<GraphView>,
    scope: OnceLock<ScopeView>,
    types: OnceLock<TypeView>,
}

impl IndexedSnapshot {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            graph: OnceLock::new(),
            scope: OnceLock::new(),
            types: OnceLock::new(),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn version(&self) -> u64 {
        self.snapshot.version
    }

    pub fn view(&self, kind: ViewKind) -> View<'_> {
        match kind {
            ViewKind::Graph => View::Graph(self.graph.get_or_init(|| GraphView::build(&self.snapshot))),
            ViewKind::Scope => View::Scope(self.scope.get_or_init(|| ScopeView::build(&self.snapshot))),
            ViewKind::Type => View::Type(self.types.get_or_init(|| TypeView::build(&self.snapshot))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_view_kind_parse() {
        assert_eq!("graph".parse::<ViewKind>().unwrap(), ViewKind::Graph);
        assert_eq!("Scope".parse::<ViewKind>().unwrap(), ViewKind::Scope);
        assert_eq!("op".parse::<ViewKind>().unwrap(), ViewKind::Type);
        assert_eq!("type".parse::<ViewKind>().unwrap(), ViewKind::Type);
        assert!(matches!(
            "tree".parse::<ViewKind>(),
            Err(OptionsError::UnknownView(_))
        ));
    }

    #[test]
    fn test_views_built_once() {
        let indexed = IndexedSnapshot::new(Snapshot::new(3, Vec::new(), BTreeMap::new()));
        assert_eq!(indexed.version(), 3);

        let first = match indexed.view(ViewKind::Graph) {
            View::Graph(view) => view as *const GraphView,
            _ => panic!("wrong view"),
        };
        let second = match indexed.view(ViewKind::Graph) {
            View::Graph(view) => view as *const GraphView,
            _ => panic!("wrong view"),
        };
        assert_eq!(first, second);
        assert_eq!(indexed.view(ViewKind::Type).kind(), ViewKind::Type);
    }
}
