//! SVG flamegraph output writer.

use super::{file_size, prepare_output_path, write_staged};
use crate::utils::error::OutputError;
use log::{debug, info};
use std::path::Path;

/// Write SVG content to a file
///
/// **Public** - main entry point for SVG output
///
/// # Arguments
/// * `svg_content` - SVG string from flamegraph generator
/// * `output_path` - Path to output SVG file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::InvalidPath` - Path is invalid
pub fn write_svg(svg_content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing SVG to: {}", output_path.display());
    prepare_output_path(output_path)?;

    if output_path.extension().is_some_and(|ext| ext != "svg") {
        debug!("File does not have .svg extension: {}", output_path.display());
    }

    write_staged(output_path, svg_content.as_bytes())?;

    let size = file_size(output_path);
    info!("SVG written successfully ({} bytes, {:.2} KB)", size, size as f64 / 1024.0);

    Ok(())
}

/// Read SVG content back from a file
pub fn read_svg(input_path: impl AsRef<Path>) -> Result<String, OutputError> {
    Ok(std::fs::read_to_string(input_path)?)
}
