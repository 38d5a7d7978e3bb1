use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the search engine.
///
/// CLI code wraps these in `anyhow` with context; library code returns them
/// directly so callers can tell user-facing outcomes (no results, busy
/// picker) from real failures.
#[derive(Debug, Error)]
pub enum TodoscopeError {
    /// The scope contained no keyword occurrences.
    #[error("no keyword matches found")]
    NoResults,

    /// A narrow key or keyword appears twice once the OTHER pair is added.
    #[error("narrow mapping conflict: {0}")]
    NarrowConflict(String),

    /// A picker is already reading input.
    #[error("a picker is already active")]
    PickerBusy,

    #[error("invalid keyword pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TodoscopeError>;
