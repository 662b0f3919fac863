//! Input validation utilities
//!
//! Checks on file paths made before a run starts, reported through the
//! structured error types in [`crate::errors`].

use std::path::Path;

use crate::errors::{Result, SortError};

/// Path conventionally meaning standard input.
pub const STDIN_PATH: &str = "-";

/// True for paths that refer to standard input.
#[must_use]
pub fn is_stdin_path<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    path == Path::new(STDIN_PATH) || path == Path::new("/dev/stdin")
}

/// Validate that a file exists
///
/// # Example
/// ```
/// use fastsort_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/file.bam", "Input file");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.is_file() {
        return Err(SortError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate the input of a sort run.
///
/// The input is read twice, so it must be a regular file and not a stream.
pub fn validate_input_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if is_stdin_path(path) {
        return Err(SortError::invalid_parameter(
            "input",
            "standard input is not supported; the input is read in two passes",
        ));
    }
    validate_file_exists(path, "Input")
}

/// Validate that the output would not overwrite the input.
pub fn validate_distinct_paths<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(SortError::invalid_parameter(
            "output",
            format!("'{}' is also the input", output.display()),
        ));
    }
    Ok(())
}
