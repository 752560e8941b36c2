//! JSON output writer.
//!
//! Writes query results and profile snapshots to JSON files with pretty formatting.

use super::{file_size, prepare_output_path, write_staged};
use crate::schema::{ProfileResult, ProfileSnapshot};
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Write any serializable value as pretty JSON
///
/// **Public** - shared entry point for JSON output
///
/// # Arguments
/// * `value` - Data to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
///
/// Nothing is written unless the whole value encodes.
pub fn write_json<T: Serialize>(value: &T, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    prepare_output_path(output_path)?;

    let bytes = serde_json::to_vec_pretty(value)?;
    write_staged(output_path, &bytes)?;

    info!(
        "Wrote {} ({} bytes)",
        output_path.display(),
        file_size(output_path)
    );
    Ok(())
}

/// Write a query result to a JSON file
///
/// # Example
/// ```ignore
/// let result = profiler.profile(ViewKind::Scope, &options)?;
/// write_result(&result, "scope.json")?;
/// ```
pub fn write_result(result: &ProfileResult, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    info!("Writing query result to: {}", output_path.as_ref().display());
    write_json(result, output_path)
}

/// Write a profile snapshot to a JSON file
pub fn write_snapshot(snapshot: &ProfileSnapshot, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    info!(
        "Writing snapshot of {} operations to: {}",
        snapshot.operations.len(),
        output_path.as_ref().display()
    );
    write_json(snapshot, output_path)
}

/// Read a query result from a JSON file
pub fn read_result(input_path: impl AsRef<Path>) -> Result<ProfileResult, OutputError> {
    read_json(input_path.as_ref())
}

/// Read a profile snapshot from a JSON file
///
/// **Public** - used by the query and validate commands
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_snapshot(input_path: impl AsRef<Path>) -> Result<ProfileSnapshot, OutputError> {
    let snapshot: ProfileSnapshot = read_json(input_path.as_ref())?;

    debug!(
        "Snapshot loaded: version {}, {} operations, {} steps",
        snapshot.version,
        snapshot.operations.len(),
        snapshot.steps.len()
    );
    Ok(snapshot)
}

fn read_json<T: DeserializeOwned>(input_path: &Path) -> Result<T, OutputError> {
    debug!("Reading JSON from: {}", input_path.display());

    let file = File::open(input_path)?;
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));

    // Result trees nest two JSON levels per shown level; depth is bounded by the query
    deserializer.disable_recursion_limit();
    let value = T::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::graph_def::OpDef;
    use crate::schema::GraphNodeProfile;
    use crate::stats::{ExecStats, OperationRecord};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::NamedTempFile;

    fn create_test_snapshot() -> ProfileSnapshot {
        let mut record = OperationRecord::new(OpDef::new("dense/matmul", "MatMul"));
        record.merge(
            3,
            ExecStats {
                exec_micros: 120,
                requested_bytes: 4096,
                run_count: 1,
                ..Default::default()
            },
        );
        ProfileSnapshot::new(BTreeMap::from([(3, 1)]), vec![record])
    }

    #[test]
    fn test_write_and_read_snapshot() {
        let snapshot = create_test_snapshot();
        let temp_file = NamedTempFile::new().unwrap();

        write_snapshot(&snapshot, temp_file.path()).unwrap();
        let loaded = read_snapshot(temp_file.path()).unwrap();

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_write_and_read_result() {
        let result = ProfileResult::Graph(GraphNodeProfile {
            name: "_root".to_string(),
            op_type: None,
            self_stats: ExecStats::default(),
            total_stats: ExecStats::default(),
            collapsed: 0,
            children: Vec::new(),
        });
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/dirs/result.json");

        write_result(&result, &path).unwrap();
        assert_eq!(read_result(&path).unwrap(), result);
    }

    #[test]
    fn test_deep_result_round_trip() {
        let mut node = GraphNodeProfile {
            name: "op0".to_string(),
            ..Default::default()
        };
        for depth in 1..200 {
            node = GraphNodeProfile {
                name: format!("op{}", depth),
                children: vec![node],
                ..Default::default()
            };
        }
        let result = ProfileResult::Graph(node);

        let temp_file = NamedTempFile::new().unwrap();
        write_result(&result, temp_file.path()).unwrap();
        assert_eq!(read_result(temp_file.path()).unwrap(), result);
    }

    #[test]
    fn test_failed_encode_keeps_existing_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "previous").unwrap();

        // non-string map keys cannot be encoded as JSON
        let bad = BTreeMap::from([((1u8, 2u8), 3u8)]);
        assert!(matches!(
            write_json(&bad, temp_file.path()),
            Err(OutputError::SerializationFailed(_))
        ));
        assert_eq!(std::fs::read_to_string(temp_file.path()).unwrap(), "previous");
    }

    #[test]
    fn test_read_snapshot_rejects_garbage() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[1, 2").unwrap();
        assert!(matches!(
            read_snapshot(temp_file.path()),
            Err(OutputError::SerializationFailed(_))
        ));
    }
}
