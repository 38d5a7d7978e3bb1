//! Resolving candidate locations to concrete destinations.

use crate::buffer::line_column;
use crate::types::{JumpTarget, Location};

fn line_text(text: &str, pos: usize) -> &str {
    let pos = pos.min(text.len());
    let start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let end = text[pos..].find('\n').map_or(text.len(), |i| pos + i);
    text[start..end].trim_end_matches('\r')
}

/// Where a location points right now.
///
/// Marker locations follow edits and resolve to `None` once their buffer is
/// gone. File locations are checked against the file on disk; a file that
/// cannot be read, or no longer has the recorded line, resolves to `None`.
pub fn resolve(location: &Location) -> Option<JumpTarget> {
    match location {
        Location::Buffer(marker) => {
            let buffer = marker.buffer()?;
            let pos = marker.position()?;
            let (line, column, text) = buffer.with_text(|text| {
                let pos = (0..=pos.min(text.len()))
                    .rev()
                    .find(|p| text.is_char_boundary(*p))
                    .unwrap_or(0);
                let (line, column) = line_column(text, pos);
                (line, column, line_text(text, pos).to_string())
            });
            Some(JumpTarget::Buffer {
                name: buffer.name(),
                line,
                column,
                text,
            })
        }
        Location::File { path, line, column } => {
            let content = match std::fs::read(path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "cannot open jump target");
                    return None;
                }
            };
            let text = content.lines().nth(line.checked_sub(1)?)?;
            Some(JumpTarget::File {
                path: path.clone(),
                line: *line,
                column: *column,
                text: text.to_string(),
            })
        }
    }
}
