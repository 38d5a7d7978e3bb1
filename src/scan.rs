//! Direct scanning of loaded text for keyword occurrences.

use std::path::Path;

use crate::buffer::Buffer;
use crate::keywords::{resolve_keyword, KeywordCatalog};
use crate::narrow::NarrowGroups;
use crate::syntax::{CommentSyntax, SyntaxCursor};
use crate::types::{Candidate, Location};

/// A keyword occurrence before it is tied to a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Hit {
    pub pos: usize,
    pub line: usize,
    pub column: usize,
    pub keyword: String,
    pub excerpt: String,
}

/// Find every keyword in `text`, in position order.
///
/// With `comments` set, hits outside comments of that syntax are dropped.
pub(crate) fn scan_text(
    catalog: &dyn KeywordCatalog,
    text: &str,
    comments: Option<CommentSyntax>,
) -> Vec<Hit> {
    let mut hits = Vec::new();
    let mut cursor = comments.map(|syntax| SyntaxCursor::new(syntax, text));
    let mut from = 0;
    let mut line = 1;
    let mut line_start = 0;
    let mut counted_to = 0;

    while from <= text.len() {
        let Some(m) = catalog.find_from(text, from) else {
            break;
        };
        from = if m.end > m.start {
            m.end
        } else {
            // empty match: step over one character
            text[m.start..]
                .chars()
                .next()
                .map_or(text.len() + 1, |c| m.start + c.len_utf8())
        };

        for (i, b) in text[counted_to..m.start].bytes().enumerate() {
            if b == b'\n' {
                line += 1;
                line_start = counted_to + i + 1;
            }
        }
        counted_to = m.start;

        if let Some(cursor) = cursor.as_mut() {
            if !cursor.in_comment(m.start) {
                continue;
            }
        }
        let Some(keyword) = resolve_keyword(text, &m) else {
            continue;
        };
        let rest = &text[m.end..];
        let eol = rest.find('\n').unwrap_or(rest.len());

        hits.push(Hit {
            pos: m.start,
            line,
            column: text[line_start..m.start].chars().count() + 1,
            keyword: keyword.to_string(),
            excerpt: rest[..eol].trim().to_string(),
        });
    }
    hits
}

/// Scan buffers in order and return their keyword candidates.
///
/// Each buffer is searched over its full text regardless of restriction;
/// point and restriction are left as they were. Locations are live markers.
pub fn scan_buffers(
    buffers: &[Buffer],
    catalog: &dyn KeywordCatalog,
    narrow: &NarrowGroups,
    comments_only: bool,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for buffer in buffers {
        let name = buffer.name();
        let comments = comments_only.then(|| buffer.syntax());
        let hits = buffer.save_excursion(|b| b.with_text(|text| scan_text(catalog, text, comments)));
        tracing::debug!(buffer = %name, hits = hits.len(), "scanned buffer");

        candidates.extend(hits.into_iter().map(|hit| Candidate {
            source_name: name.clone(),
            line_number: hit.line,
            narrow_key: narrow.key_for(&hit.keyword),
            keyword_type: hit.keyword,
            location: Location::Buffer(buffer.marker_at(hit.pos)),
            excerpt: hit.excerpt,
        }));
    }
    candidates
}

/// Candidates for a file's contents with static file locations.
pub fn scan_file_text(
    path: &Path,
    text: &str,
    catalog: &dyn KeywordCatalog,
    narrow: &NarrowGroups,
) -> Vec<Candidate> {
    let source_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    scan_text(catalog, text, None)
        .into_iter()
        .map(|hit| Candidate {
            source_name: source_name.clone(),
            line_number: hit.line,
            narrow_key: narrow.key_for(&hit.keyword),
            keyword_type: hit.keyword,
            location: Location::File {
                path: path.to_path_buf(),
                line: hit.line,
                column: hit.column,
            },
            excerpt: hit.excerpt,
        })
        .collect()
}
