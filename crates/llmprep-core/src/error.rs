//! Error types for llmprep.

use thiserror::Error;

/// Result type alias for llmprep operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Main error type for llmprep operations.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HuggingFace Hub errors.
    #[error("Hub error: {0}")]
    Hub(String),

    /// Tokenizer errors.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Table reading or casting errors.
    #[error("Table error: {0}")]
    Table(String),

    /// A requested column does not exist in the table.
    #[error("Column '{column}' not found. Available columns: {available:?}")]
    ColumnNotFound {
        /// Requested column.
        column: String,
        /// Columns present in the table.
        available: Vec<String>,
    },

    /// Malformed escape sequence in a literal.
    #[error("Invalid escape sequence at byte {position}: {reason}")]
    Escape {
        /// Byte offset of the offending backslash.
        position: usize,
        /// What went wrong.
        reason: String,
    },

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
