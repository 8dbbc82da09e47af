use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Row-level problems (unparsable dates, dirty numerics) are *not* errors:
/// the loader recovers locally by dropping the row or zero-filling the cell.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The source file does not exist.
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    /// The source file exists but could not be read or parsed structurally.
    #[error("cannot read source file {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The file extension maps to no known loader.
    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    /// An aggregation request named an unknown field, key, or reducer.
    /// This is a programming error on the caller's side, never recovered.
    #[error("malformed aggregation request: {0}")]
    MalformedRequest(String),
}

impl EngineError {
    /// Wrap a read/parse failure for the given source path.
    pub fn unreadable(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        EngineError::SourceUnreadable {
            path: path.into(),
            source: source.into(),
        }
    }
}
