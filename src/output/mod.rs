//! Output writers for query results, snapshots and flamegraphs.
//!
//! This module handles writing data to disk in various formats:
//! - JSON results and profile snapshots
//! - Indented text reports
//! - SVG flamegraphs

pub mod json;
pub mod svg;
pub mod text;

// Re-export main functions
pub use json::{read_result, read_snapshot, write_json, write_result, write_snapshot};
pub use svg::{read_svg, write_svg};
pub use text::{format_bytes, format_micros, render_result};

use crate::utils::error::OutputError;
use log::debug;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Validate that an output path is writable and create its parent directories
///
/// **Private** - shared by the writers in this module
fn prepare_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!("Cannot create directory {}: {}", parent.display(), e))
            })?;
        }
    }

    Ok(())
}

/// Write `bytes` beside `path` and rename into place
///
/// **Private** - a failed write leaves any existing file untouched
fn write_staged(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    staged.persist(path).map_err(|e| OutputError::WriteFailed(e.error))?;
    Ok(())
}

/// File size in bytes, 0 when unknown
fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_output_path_empty() {
        assert!(prepare_output_path(Path::new("")).is_err());
    }

    #[test]
    fn test_prepare_output_path_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(prepare_output_path(temp_dir.path()).is_err());
    }

    #[test]
    fn test_prepare_output_path_creates_parents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("a/b/out.json");
        prepare_output_path(&nested).unwrap();
        assert!(temp_dir.path().join("a/b").is_dir());
    }

    #[test]
    fn test_write_staged_replaces_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.txt");
        std::fs::write(&path, "old").unwrap();

        write_staged(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }
}
