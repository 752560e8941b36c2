//! Configuration and constants shared across the profiler.

/// Current snapshot schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Delimiter between name-scope segments ("outer/inner/op")
pub const SCOPE_DELIMITER: char = '/';

/// Name of the synthetic root node in graph and scope views
pub const ROOT_NODE_NAME: &str = "_root";

/// Name of the node that absorbs truncated or filtered-out nodes
pub const OTHERS_NODE_NAME: &str = "_others";

/// Operation type assigned to operations seen only in traces
pub const UNKNOWN_OP_TYPE: &str = "Unknown";

/// Levels shown below the root when a query does not say
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Upper bound for `max_depth` in query options
pub const MAX_QUERY_DEPTH: usize = 1_000;

// Field names for trace parsing (different producers nest step stats differently)
pub const STEP_STATS_FIELD_NAMES: &[&str] = &["step_stats", "stepStats"];
pub const DEV_STATS_FIELD_NAMES: &[&str] = &["dev_stats", "devStats", "devices"];
pub const NODE_STATS_FIELD_NAMES: &[&str] = &["node_stats", "nodeStats", "nodes"];

// Device name fragments that mark accelerator time (matched case-insensitively)
pub const ACCELERATOR_DEVICE_MARKERS: &[&str] = &["gpu", "tpu", "accelerator"];

// Input name prefix marking a control dependency ("^init")
pub const CONTROL_INPUT_PREFIX: char = '^';

// Separator before an output port index ("matmul:1")
pub const OUTPUT_PORT_SEPARATOR: char = ':';
