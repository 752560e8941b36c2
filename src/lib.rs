//! Graph Profiler
//!
//! Step-indexed execution profiles for dataflow graphs.
//!
//! A [`Profiler`] is built once from a graph definition, accepts any number
//! of per-step execution traces, and answers three aggregate queries over the
//! same statistics: by dataflow structure, by name scope, and by operation
//! type. Its state serializes into a versioned snapshot for offline queries.
//!
//! ## Getting Started
//!
//! ```ignore
//! use graph_profiler::{Profiler, QueryOptions};
//!
//! let profiler = Profiler::from_json(&graph_json)?;
//! profiler.add_step(0, &trace)?;
//!
//! let scopes = profiler.profile_name_scope(&QueryOptions::default().with_max_depth(2))?;
//! let bytes = profiler.serialize_to_string()?;
//! ```
//!
//! The `graphprof` binary wraps the same API:
//!
//! ```bash
//! graphprof profile --graph graph.json --trace 0=step0.json --view scope
//! ```

pub mod aggregator;
pub mod commands;
pub mod flamegraph;
pub mod options;
pub mod output;
pub mod parser;
pub mod profiler;
pub mod schema;
pub mod stats;
pub mod topology;
pub mod utils;

pub use aggregator::Metric;
pub use options::{QueryOptions, StepFilter};
pub use parser::{GraphDef, OpDef};
pub use profiler::Profiler;
pub use schema::{GraphNodeProfile, MultiNodeProfile, ProfileResult, ProfileSnapshot};
pub use stats::{ExecStats, OperationRecord, StepSummary};
pub use topology::ViewKind;
pub use utils::error::{GraphError, OptionsError, SerializeError, TraceError};
