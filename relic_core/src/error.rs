use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors surfaced by the blob store. Everything else in the engine is
/// absorbed locally (a failed field never aborts a walk).
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
