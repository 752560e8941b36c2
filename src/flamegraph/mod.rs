//! Flamegraph generation using the inferno library.
//!
//! This module converts collapsed stacks into interactive SVG flamegraphs.
//! Flamegraphs show where time or memory goes across name scopes.

pub mod generator;

// Re-export main types
pub use generator::{generate_flamegraph, generate_text_summary, FlamegraphConfig};
