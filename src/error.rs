//! Error types for bundle encoding and decoding

/// Any bundle-related error, from malformed archives to I/O failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The archive (or the content being encoded) breaks the wire format.
    #[error("format error at line {line}: {kind}")]
    Format {
        /// 1-based line the problem was detected on (0 when no line was read)
        line: usize,
        /// What went wrong
        kind: FormatError,
    },

    /// An entry failed checksum verification.
    #[error("checksum: {0}")]
    Checksum(#[from] ChecksumError),

    /// The requested options can't work together.
    #[error("configuration: {0}")]
    Configuration(String),

    /// I/O-related error
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn format(line: usize, kind: FormatError) -> Self {
        Self::Format { line, kind }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// The format error kind, if this is a format error.
    pub fn format_kind(&self) -> Option<&FormatError> {
        match self {
            Self::Format { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Specific wire format violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The stream ended before the separator line could be read.
    #[error("empty stream, no separator line")]
    EmptyStream,

    /// The first line was blank, so there is no usable separator.
    #[error("separator line is blank")]
    InvalidSeparator,

    /// A checksum line appeared where a filename was required.
    #[error("checksum found before any filename")]
    MissingFilename,

    /// An entry reached commit with no filename.
    #[error("empty filename")]
    EmptyFilename,

    /// The filename is absolute or escapes the destination root.
    #[error("filename '{name}' is not a safe relative path")]
    UnsafeFilename { name: String },

    /// The input ended where more tokens were required.
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// A checksum value that isn't 64 hex characters.
    #[error("malformed checksum '{value}', expected 64 hex characters")]
    MalformedChecksum { value: String },

    /// The checksum names an algorithm other than SHA256.
    #[error("unsupported checksum algorithm '{algorithm}'")]
    UnsupportedChecksumAlgorithm { algorithm: String },

    /// File content has a line identical to the separator.
    #[error("content of '{name}' contains the separator line")]
    SeparatorInContent { name: String },

    /// File content is not valid UTF-8 text.
    #[error("content of '{name}' is not valid UTF-8")]
    InvalidUtf8 { name: String },
}

/// Checksum verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
    /// The computed digest differs from the stored one.
    #[error("mismatch for '{filename}': expected {expected}, actual {actual}")]
    Mismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// Verification was required but the entry carries no checksum.
    #[error("no checksum for '{filename}' while verification is required")]
    Missing { filename: String },
}

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_display_has_line() {
        let err = Error::format(7, FormatError::MissingFilename);
        assert_eq!(
            err.to_string(),
            "format error at line 7: checksum found before any filename"
        );
        assert_eq!(err.format_kind(), Some(&FormatError::MissingFilename));
    }

    #[test]
    fn test_checksum_error_converts() {
        let err: Error = ChecksumError::Missing {
            filename: "a.txt".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Checksum(ChecksumError::Missing { .. })));
        assert!(err.format_kind().is_none());
    }
}
