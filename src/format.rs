//! Aligned display lines for a candidate list.

use colored::Colorize;

use crate::error::{Result, TodoscopeError};
use crate::keywords::StyleProvider;
use crate::types::{Candidate, Location};

/// One row shown by the picker, carrying the data needed to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    /// Aligned plain text
    pub text: String,
    /// Same row with terminal styling
    pub styled: String,
    pub location: Location,
    pub narrow_key: Option<char>,
    pub keyword: String,
}

impl DisplayLine {
    /// Copy shortened to at most `width` characters; metadata is kept.
    pub fn truncated(&self, width: usize) -> DisplayLine {
        if self.text.chars().count() <= width {
            return self.clone();
        }
        let text: String = self.text.chars().take(width).collect();
        DisplayLine {
            styled: text.clone(),
            text,
            ..self.clone()
        }
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

/// Render candidates as aligned rows `name line type excerpt`.
///
/// Column widths are the widest value of each field in this result set.
/// An empty input is an error: there is nothing to show.
pub fn format(candidates: &[Candidate], styles: &dyn StyleProvider) -> Result<Vec<DisplayLine>> {
    if candidates.is_empty() {
        return Err(TodoscopeError::NoResults);
    }

    let lines: Vec<String> = candidates.iter().map(|c| c.line_number.to_string()).collect();
    let name_w = candidates.iter().map(|c| width(&c.source_name)).max().unwrap_or(0);
    let line_w = lines.iter().map(String::len).max().unwrap_or(0);
    let type_w = candidates.iter().map(|c| width(&c.keyword_type)).max().unwrap_or(0);

    let rows = candidates
        .iter()
        .zip(lines)
        .map(|(candidate, line)| {
            let name = format!("{:<name_w$}", candidate.source_name);
            let line = format!("{line:<line_w$}");
            let keyword = format!("{:<type_w$}", candidate.keyword_type);
            let text = format!("{name} {line} {keyword} {}", candidate.excerpt);

            let name = match candidate.location {
                Location::Buffer(_) => name.bold(),
                Location::File { .. } => name.cyan(),
            };
            let keyword = match styles.resolve(&candidate.keyword_type) {
                Some(color) => keyword.color(color).bold(),
                None => keyword.bold(),
            };
            let styled = format!("{name} {} {keyword} {}", line.dimmed(), candidate.excerpt);

            DisplayLine {
                text,
                styled,
                location: candidate.location.clone(),
                narrow_key: candidate.narrow_key,
                keyword: candidate.keyword_type.clone(),
            }
        })
        .collect();
    Ok(rows)
}
