//! Keyword catalog: which words count as annotation keywords, how to find
//! them, and how to color them.

use colored::Color;
use regex::Regex;

use crate::config::KeywordsConfig;
use crate::error::Result;

/// One keyword occurrence found by a catalog matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatch<'t> {
    /// Byte offset where the match starts
    pub start: usize,
    /// Byte offset just past the match, including trailing punctuation
    pub end: usize,
    /// The keyword text when the matcher captured it
    pub keyword: Option<&'t str>,
}

/// Finds keywords in raw text.
pub trait KeywordCatalog: Send + Sync {
    /// Next occurrence at or after byte offset `from`.
    fn find_from<'t>(&self, text: &'t str, from: usize) -> Option<KeywordMatch<'t>>;

    /// Regular expression an external search process can use to find the
    /// same keywords.
    fn search_regex(&self) -> &str;

    /// The keyword inside an already matched span such as `"TODO:"`.
    fn keyword_in<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.find_from(text, 0).and_then(|m| m.keyword)
    }
}

/// Resolves a keyword to its display color.
pub trait StyleProvider {
    fn resolve(&self, keyword: &str) -> Option<Color>;
}

/// Word made of alphanumerics and underscores surrounding `pos`.
pub fn word_at(text: &str, pos: usize) -> Option<&str> {
    if pos > text.len() || !text.is_char_boundary(pos) {
        return None;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let start = text[..pos]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word(*c))
        .last()
        .map_or(pos, |(i, _)| i);
    let end = text[pos..]
        .char_indices()
        .find(|(_, c)| !is_word(*c))
        .map_or(text.len(), |(i, _)| pos + i);
    (start < end).then(|| &text[start..end])
}

/// Keyword text for a match.
///
/// Uses the captured text when present, otherwise the word at the match
/// position, otherwise the matched span itself. Returns `None` only when all
/// three are empty.
pub fn resolve_keyword<'t>(text: &'t str, m: &KeywordMatch<'t>) -> Option<&'t str> {
    m.keyword
        .filter(|k| !k.is_empty())
        .or_else(|| word_at(text, m.start))
        .or_else(|| {
            let span = text[m.start..m.end].trim();
            (!span.is_empty()).then_some(span)
        })
}

fn parse_color(name: &str) -> Option<Color> {
    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(Color::TrueColor {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        });
    }
    name.parse::<Color>().ok()
}

/// Catalog built from the configured keyword list.
#[derive(Debug, Clone)]
pub struct HighlightCatalog {
    faces: Vec<(String, Option<Color>)>,
    regex: Regex,
}

impl HighlightCatalog {
    pub fn from_config(config: &KeywordsConfig) -> Result<Self> {
        let faces: Vec<(String, Option<Color>)> = config
            .faces
            .iter()
            .filter(|face| !face.keyword.is_empty())
            .map(|face| {
                let color = parse_color(&face.color);
                if color.is_none() {
                    tracing::warn!(keyword = %face.keyword, color = %face.color, "unknown color");
                }
                (face.keyword.clone(), color)
            })
            .collect();

        let alternation = faces
            .iter()
            .map(|(keyword, _)| regex::escape(keyword))
            .collect::<Vec<_>>()
            .join("|");
        let mut pattern = format!(r"\b({alternation})\b");
        if !config.punctuation.is_empty() {
            pattern.push_str(&format!("[{}]*", regex::escape(&config.punctuation)));
        }
        let regex = Regex::new(&pattern)?;

        Ok(Self { faces, regex })
    }
}

impl KeywordCatalog for HighlightCatalog {
    fn find_from<'t>(&self, text: &'t str, from: usize) -> Option<KeywordMatch<'t>> {
        let caps = self.regex.captures_at(text, from)?;
        let whole = caps.get(0)?;
        Some(KeywordMatch {
            start: whole.start(),
            end: whole.end(),
            keyword: caps.get(1).map(|m| m.as_str()),
        })
    }

    fn search_regex(&self) -> &str {
        self.regex.as_str()
    }
}

impl StyleProvider for HighlightCatalog {
    fn resolve(&self, keyword: &str) -> Option<Color> {
        self.faces
            .iter()
            .find(|(kw, _)| kw == keyword)
            .and_then(|(_, color)| *color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordFace;

    fn catalog() -> HighlightCatalog {
        HighlightCatalog::from_config(&KeywordsConfig::default()).unwrap()
    }

    #[test]
    fn test_match_includes_punctuation() {
        let text = "// TODO: fix this";
        let m = catalog().find_from(text, 0).unwrap();
        assert_eq!(&text[m.start..m.end], "TODO:");
        assert_eq!(m.keyword, Some("TODO"));
    }

    #[test]
    fn test_match_requires_word_boundary() {
        let c = catalog();
        assert!(c.find_from("TODOS and XFIXME", 0).is_none());
        assert!(c.find_from("todo lowercase", 0).is_none());
    }

    #[test]
    fn test_find_from_offset() {
        let text = "TODO one, FIXME two";
        let c = catalog();
        let first = c.find_from(text, 0).unwrap();
        let second = c.find_from(text, first.end).unwrap();
        assert_eq!(second.keyword, Some("FIXME"));
        assert!(c.find_from(text, second.end).is_none());
    }

    #[test]
    fn test_keyword_in_span() {
        let c = catalog();
        assert_eq!(c.keyword_in("HACK:"), Some("HACK"));
        assert_eq!(c.keyword_in("nothing"), None);
    }

    #[test]
    fn test_search_regex_is_usable_externally() {
        let c = catalog();
        assert!(c.search_regex().starts_with(r"\b(TODO|FIXME|BUG|HACK"));
        assert!(Regex::new(c.search_regex()).is_ok());
    }

    #[test]
    fn test_style_lookup() {
        let c = catalog();
        assert_eq!(
            c.resolve("TODO"),
            Some(Color::TrueColor {
                r: 0xcc,
                g: 0x93,
                b: 0x93
            })
        );
        assert_eq!(c.resolve("UNKNOWN"), None);
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(parse_color("red"), Some(Color::Red));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("#zzzzzz"), None);
        assert_eq!(parse_color("#+1a2b3"), None);
    }

    #[test]
    fn test_multibyte_hex_color_is_ignored() {
        // six bytes, but not six hex digits
        assert_eq!(parse_color("#aééb"), None);

        let config = KeywordsConfig {
            faces: vec![KeywordFace {
                keyword: "TODO".into(),
                color: "#aééb".into(),
            }],
            ..KeywordsConfig::default()
        };
        let c = HighlightCatalog::from_config(&config).unwrap();
        assert_eq!(c.resolve("TODO"), None);
        assert!(c.find_from("// TODO: x", 0).is_some());
    }

    #[test]
    fn test_word_at() {
        let text = "  // FIXME_2: later";
        let pos = text.find("FIXME").unwrap();
        assert_eq!(word_at(text, pos), Some("FIXME_2"));
        assert_eq!(word_at(text, pos + 3), Some("FIXME_2"));
        assert_eq!(word_at(text, 0), None);
    }

    #[test]
    fn test_resolve_keyword_falls_back_to_word_at_point() {
        let text = "x BUG: y";
        let m = KeywordMatch {
            start: 2,
            end: 6,
            keyword: None,
        };
        assert_eq!(resolve_keyword(text, &m), Some("BUG"));

        let empty_capture = KeywordMatch {
            keyword: Some(""),
            ..m
        };
        assert_eq!(resolve_keyword(text, &empty_capture), Some("BUG"));
    }
}
