//! Custom error types for fastsort operations.

use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias for fastsort operations
pub type Result<T> = std::result::Result<T, SortError>;

/// Error type for fastsort operations
#[derive(Error, Debug)]
pub enum SortError {
    /// A header line could not be turned into a contig declaration
    #[error("Malformed header line '{line}': {reason}")]
    MalformedHeader {
        /// The offending header line, without its trailing newline
        line: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A record line is missing the reference or position field
    #[error("Malformed record at line {line_number}: {reason}")]
    MalformedRecord {
        /// 1-based line number within the decoded stream
        line_number: u64,
        /// Explanation of the problem
        reason: String,
    },

    /// A record names a contig that no `@SQ` line declared
    #[error("Reference sequence '{name}' not found in header")]
    UnknownReference {
        /// The reference name as it appeared in the record
        name: String,
    },

    /// The alignment toolkit could not be started
    #[error("Failed to launch '{tool}': {source}")]
    ToolInvocation {
        /// Command that was being launched
        tool: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// The alignment toolkit ran but exited unsuccessfully
    #[error("'{tool}' exited with {status}: {stderr}")]
    ToolFailed {
        /// Command that failed
        tool: String,
        /// Exit status of the child
        status: ExitStatus,
        /// Captured standard error, possibly empty
        stderr: String,
    },

    /// Final concatenation of sorted blocks failed
    #[error("Concatenation with '{tool}' failed ({status}): {stderr}")]
    ConcatenationFailure {
        /// Command that failed
        tool: String,
        /// Exit status of the child
        status: ExitStatus,
        /// Captured standard error, possibly empty
        stderr: String,
    },

    /// The second pass did not see the same input the first pass measured
    #[error("Input changed between passes: {reason}")]
    InputChanged {
        /// What differed
        reason: String,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "SAM", "BAM")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// I/O failure while reading or writing an intermediate file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SortError {
    /// Shorthand for an [`SortError::InvalidParameter`].
    pub(crate) fn invalid_parameter(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { parameter: parameter.to_string(), reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_header() {
        let error = SortError::MalformedHeader {
            line: "@SQ\tSN:\tLN:100".to_string(),
            reason: "empty contig name".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Malformed header line"));
        assert!(msg.contains("empty contig name"));
    }

    #[test]
    fn test_malformed_record() {
        let error =
            SortError::MalformedRecord { line_number: 12, reason: "missing position".to_string() };
        let msg = format!("{error}");
        assert!(msg.contains("line 12"));
        assert!(msg.contains("missing position"));
    }

    #[test]
    fn test_unknown_reference() {
        let error = SortError::UnknownReference { name: "chr7".to_string() };
        assert!(format!("{error}").contains("Reference sequence 'chr7' not found"));
    }

    #[test]
    fn test_tool_invocation_keeps_source() {
        let error = SortError::ToolInvocation {
            tool: "samtools".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(format!("{error}").contains("Failed to launch 'samtools'"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_invalid_parameter_helper() {
        let error = SortError::invalid_parameter("threads", "must be >= 1");
        let msg = format!("{error}");
        assert!(msg.contains("Invalid parameter 'threads'"));
        assert!(msg.contains("must be >= 1"));
    }

    #[test]
    fn test_io_conversion() {
        let error: SortError = std::io::Error::other("disk full").into();
        assert!(matches!(error, SortError::Io(_)));
        assert_eq!(format!("{error}"), "disk full");
    }
}
