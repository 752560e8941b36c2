//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod models;
pub mod profile;
pub mod utils;

// Re-export main command functions
pub use models::{ProfileArgs, QueryArgs, QuerySnapshotArgs, TraceInput};
pub use profile::{execute_profile, execute_query, run_query, validate_args, validate_query_args};
pub use utils::{display_schema, display_version, validate_snapshot_file};
