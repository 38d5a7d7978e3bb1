use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::buffer::Marker;

/// Where a candidate points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Live position in a loaded buffer; follows edits while the buffer exists
    Buffer(Marker),
    /// Position recorded when a directory was searched; may go stale
    File {
        path: PathBuf,
        line: usize,
        column: usize,
    },
}

/// One keyword occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Buffer name or file base name
    pub source_name: String,
    /// 1-based line number
    pub line_number: usize,
    /// The matched keyword, e.g. "TODO"; never empty
    pub keyword_type: String,
    pub location: Location,
    /// Narrow key for grouping; `None` when the keyword is ungrouped
    pub narrow_key: Option<char>,
    /// Rest of the line after the keyword, trimmed
    pub excerpt: String,
}

/// Serializable view of a candidate for `--json` output
#[derive(Debug, Clone, Serialize)]
pub struct CandidateOutput {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrow: Option<char>,
    pub excerpt: String,
}

impl From<&Candidate> for CandidateOutput {
    fn from(candidate: &Candidate) -> Self {
        let (path, column) = match &candidate.location {
            Location::File { path, column, .. } => {
                (Some(path.display().to_string()), Some(*column))
            }
            Location::Buffer(marker) => {
                let column = marker
                    .buffer()
                    .zip(marker.position())
                    .map(|(buffer, pos)| buffer.line_column_at(pos).1);
                (None, column)
            }
        };
        Self {
            source: candidate.source_name.clone(),
            path,
            line: candidate.line_number,
            column,
            keyword: candidate.keyword_type.clone(),
            narrow: candidate.narrow_key,
            excerpt: candidate.excerpt.clone(),
        }
    }
}

/// Resolved destination of a jump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    Buffer {
        name: String,
        line: usize,
        column: usize,
        /// Current text of the target line
        text: String,
    },
    File {
        path: PathBuf,
        line: usize,
        column: usize,
        text: String,
    },
}

impl JumpTarget {
    pub fn text(&self) -> &str {
        match self {
            JumpTarget::Buffer { text, .. } | JumpTarget::File { text, .. } => text,
        }
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Buffer {
                name, line, column, ..
            } => write!(f, "{name}:{line}:{column}"),
            JumpTarget::File {
                path, line, column, ..
            } => write!(f, "{}:{line}:{column}", path.display()),
        }
    }
}
