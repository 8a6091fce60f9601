//! Standalone error types for imaging-memory
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//! Configuration setters and allocation paths return [`MemoryError`];
//! the environment loader never does (see [`crate::env::EnvWarning`]).

use core::alloc::Layout;
use thiserror::Error;

/// Errors raised by the pixel arena
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// A configuration value is outside its domain
    #[error("invalid {parameter} {value}: {reason}")]
    InvalidArgument {
        parameter: &'static str,
        value: String,
        reason: String,
    },

    /// The operating system refused to hand out memory
    #[error("out of memory: {size} bytes with {align} byte alignment")]
    OutOfMemory { size: usize, align: usize },

    /// A request size could not be represented
    #[error("size overflow during {operation}")]
    SizeOverflow { operation: String },
}

impl MemoryError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "MEM:CONFIG:INVALID",
            Self::OutOfMemory { .. } => "MEM:ALLOC:OOM",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
        }
    }

    /// Create invalid argument error
    pub fn invalid_argument(
        parameter: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            parameter,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Create out of memory error
    pub fn out_of_memory(size: usize, align: usize) -> Self {
        Self::OutOfMemory { size, align }
    }

    /// Create out of memory error from layout
    pub fn out_of_memory_with_layout(layout: Layout) -> Self {
        Self::out_of_memory(layout.size(), layout.align())
    }

    /// Create size overflow error
    pub fn size_overflow(operation: &str) -> Self {
        Self::SizeOverflow {
            operation: operation.to_string(),
        }
    }

    /// Check if this is a validation failure of a setter
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Check if the allocator ran out of memory
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for memory operations
pub type MemoryResult<T> = core::result::Result<T, MemoryError>;

/// Generic result type alias
pub type Result<T> = MemoryResult<T>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_message() {
        let error = MemoryError::invalid_argument("alignment", 3, "must be a power of two");
        assert!(error.to_string().contains("alignment"));
        assert!(error.to_string().contains('3'));
        assert!(error.is_invalid_argument());
        assert!(!error.is_out_of_memory());
    }

    #[test]
    fn test_error_with_layout() {
        let layout = Layout::from_size_align(4096, 32).unwrap();
        let error = MemoryError::out_of_memory_with_layout(layout);
        assert!(error.to_string().contains("4096"));
        assert!(error.is_out_of_memory());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MemoryError::invalid_argument("block size", 0, "zero").code(),
            "MEM:CONFIG:INVALID"
        );
        assert_eq!(MemoryError::out_of_memory(1, 1).code(), "MEM:ALLOC:OOM");
        assert_eq!(
            MemoryError::size_overflow("line layout").code(),
            "MEM:ALLOC:OVERFLOW"
        );
    }
}
