//! Unified error handling for tessera
//!
//! Every fallible operation in the projection layer returns [`TesseraError`].
//! Validation errors are raised at the point of mismatch; native failures carry
//! the engine's status code and message untouched.

use thiserror::Error;

use crate::native::StatusCode;
use tessera_types::{ElementType, MetadataError, ValueKind};

/// Main error type for tessera operations
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Host value kind is incompatible with the expected or recorded kind
    #[error("Kind mismatch: expected {expected}, found {actual}")]
    KindMismatch {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Tensor element type differs from the declared element type
    #[error("Element type mismatch: expected {expected}, found {actual}")]
    ElementTypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    /// A sequence member's kind differs from the sequence's element kind
    #[error("Sequence element {index} has kind {actual}, expected {expected}")]
    ElementKindMismatch {
        index: usize,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Map key tensor element type differs from the declared key type
    #[error("Map key type mismatch: expected {expected}, found {actual}")]
    KeyTypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    /// Map value tensor element type differs from the declared value type
    #[error("Map value type mismatch: expected {expected}, found {actual}")]
    ValueTypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    /// Tensor shape differs from the declared dimensions
    #[error("Shape mismatch: expected {expected:?}, found {actual:?}")]
    ShapeMismatch { expected: Vec<i64>, actual: Vec<usize> },

    /// Value kind with no host-side representation
    #[error("Unsupported value kind: {0}")]
    UnsupportedValueKind(ValueKind),

    /// Element type with no host-side reconstruction
    #[error("Unsupported element type: {0}")]
    UnsupportedElementType(ElementType),

    /// A native call reported failure
    #[error("Native call '{call}' failed ({code}): {message}")]
    NativeCallFailure {
        call: &'static str,
        code: StatusCode,
        message: String,
    },

    /// Invalid input/argument errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors with source location for debugging.
    /// Use the `tessera_internal!()` macro to create these.
    #[error("Internal error: {message} (at {file}:{line})")]
    Internal {
        message: String,
        file: &'static str,
        line: u32,
    },
}

/// Create an internal error with automatic file/line capture.
///
/// ```rust,ignore
/// use tessera_core::tessera_internal;
/// return Err(tessera_internal!("handle {} vanished", handle));
/// ```
#[macro_export]
macro_rules! tessera_internal {
    ($($arg:tt)*) => {
        $crate::error::TesseraError::Internal {
            message: format!($($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Convenience type alias for Results using TesseraError
pub type TesseraResult<T> = std::result::Result<T, TesseraError>;

/// Short alias, `Result<T>` is equivalent to `TesseraResult<T>`
pub type Result<T> = TesseraResult<T>;

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        TesseraError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for TesseraError {
    fn from(err: serde_yaml::Error) -> Self {
        TesseraError::Config(format!("YAML parse error: {}", err))
    }
}

impl From<MetadataError> for TesseraError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::Io(io) => TesseraError::Io(io),
            other => TesseraError::Config(other.to_string()),
        }
    }
}

impl TesseraError {
    /// Create a native call failure
    pub fn native<S: Into<String>>(call: &'static str, code: StatusCode, message: S) -> Self {
        TesseraError::NativeCallFailure {
            call,
            code,
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        TesseraError::InvalidInput(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        TesseraError::NotFound(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TesseraError::Config(msg.into())
    }

    /// Whether the error came from the native side rather than validation
    pub fn is_native(&self) -> bool {
        matches!(self, TesseraError::NativeCallFailure { .. })
    }
}
