//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while ingesting one step trace
///
/// These are warning-level: the offending step is skipped and the
/// profiler keeps every previously ingested step.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed trace for step {step}: {reason}")]
    MalformedTrace { step: i64, reason: String },

    #[error("Trace for step {step} conflicts with the graph: {source}")]
    Conflict {
        step: i64,
        #[source]
        source: GraphError,
    },
}

/// Errors that can occur while building the profiler from a graph definition
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate operation name: {0}")]
    DuplicateOperation(String),

    #[error("Invalid name scope '{scope}' for operation {op}")]
    InvalidScope { op: String, scope: String },

    #[error("Operations {first} and {second} share the name scope '{scope}'")]
    DuplicateScope {
        first: String,
        second: String,
        scope: String,
    },
}

/// Errors reported when query options are rejected
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Step {0} was never added to the profiler")]
    UnknownStep(i64),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Option {name} out of range: {value}")]
    OutOfRange { name: &'static str, value: usize },

    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Options TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors that can occur while encoding or decoding a profile snapshot
#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(serde_json::Error),

    #[error("Failed to decode snapshot: {0}")]
    Decode(serde_json::Error),

    #[error("Incompatible snapshot version: found {found}, expected {expected}")]
    IncompatibleVersion { found: String, expected: String },

    #[error("Snapshot graph is invalid: {0}")]
    InvalidGraph(#[from] GraphError),
}

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Empty stack data")]
    EmptyStacks,

    #[error("Failed to render flamegraph: {0}")]
    Render(String),

    #[error("Flamegraph output is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
