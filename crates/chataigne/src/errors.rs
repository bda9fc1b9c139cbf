use serde_json::Value;
use thiserror::Error;

/// Errors from the structural merge primitive. Both are fatal to the merge
/// call that raised them; no partial result is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("Conflict on key '{key}': {left} != {right}")]
    Conflict {
        key: String,
        left: Value,
        right: Value,
    },

    #[error("Cannot merge {left} and {right}")]
    TypeMismatch { left: Value, right: Value },
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid tool schema: {0}")]
    Schema(String),

    #[error("A tool named '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
