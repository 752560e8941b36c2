//! Input parsing.
//!
//! This module handles:
//! - Parsing the graph definition
//! - Parsing raw step traces into per-operation samples
//! - Validating both before anything reaches the statistics store

pub mod graph_def;
pub mod run_trace;

// Re-export main types
pub use graph_def::{GraphDef, OpDef};
pub use run_trace::{parse_step_trace, OpSample, StepTrace};
