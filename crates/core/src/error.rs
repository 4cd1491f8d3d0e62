//! Core error types for the OTBM codec

#[derive(thiserror::Error, Debug)]
pub enum OtbmError {
    /// Leading identifier is neither zero nor "OTBM"
    #[error("Unknown map format identifier: {0:#010x}")]
    UnknownFormat(u32),

    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Unknown node kind: {0:#04x}")]
    UnknownNodeKind(u8),

    /// Escape byte with nothing after it
    #[error("Escape byte at end of data")]
    TruncatedEscape,

    #[error("Node nesting exceeds maximum depth of {0}")]
    MaxDepthExceeded(usize),

    #[error("Expected node start marker, found {0:#04x}")]
    MissingNodeStart(u8),

    #[error("String of {0} bytes does not fit a 16-bit length prefix")]
    StringTooLong(usize),

    #[error("Character {0:?} cannot be stored as a single byte")]
    InvalidString(char),

    #[error("Attribute {attribute} expects a {expected} value")]
    AttributeShape {
        attribute: &'static str,
        expected: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl OtbmError {
    /// Whether a caller may skip the offending node and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OtbmError::UnknownNodeKind(_) | OtbmError::TruncatedEscape)
    }

    /// Shorthand used by readers that know how many bytes they wanted
    pub fn eof(needed: usize, remaining: usize) -> Self {
        OtbmError::UnexpectedEof { needed, remaining }
    }
}

pub type Result<T> = std::result::Result<T, OtbmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(OtbmError::UnknownNodeKind(0x42).is_recoverable());
        assert!(OtbmError::TruncatedEscape.is_recoverable());
        assert!(!OtbmError::UnknownFormat(1).is_recoverable());
        assert!(!OtbmError::MaxDepthExceeded(64).is_recoverable());
        assert!(!OtbmError::eof(2, 1).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = OtbmError::UnknownFormat(0x12345678);
        assert_eq!(err.to_string(), "Unknown map format identifier: 0x12345678");

        let err = OtbmError::eof(4, 1);
        assert_eq!(err.to_string(), "Unexpected end of data: needed 4 bytes, 1 remaining");
    }
}
