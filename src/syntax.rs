//! Lexical comment detection.
//!
//! Answers "is this position inside a comment" by walking the text forward
//! from the start and tracking code, string and comment state. The walk is
//! incremental: a [`SyntaxCursor`] queried with ascending positions only
//! scans each byte once.

use std::path::Path;

/// Comment and string delimiters for one language family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    pub line: &'static [&'static str],
    pub block: &'static [(&'static str, &'static str)],
    pub strings: &'static [char],
    /// `'x'` is a character literal rather than a string opener
    pub char_literals: bool,
}

const C_FAMILY: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: &[("/*", "*/")],
    strings: &['"', '\''],
    char_literals: false,
};

// Rust uses ' for lifetimes and char literals, so only double quotes open strings.
const RUST: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: &[("/*", "*/")],
    strings: &['"'],
    char_literals: true,
};

const HASH: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: &[],
    strings: &['"', '\''],
    char_literals: false,
};

const DASH_DASH: CommentSyntax = CommentSyntax {
    line: &["--"],
    block: &[("--[[", "]]"), ("{-", "-}"), ("/*", "*/")],
    strings: &['"', '\''],
    char_literals: false,
};

const LISP: CommentSyntax = CommentSyntax {
    line: &[";"],
    block: &[("#|", "|#")],
    strings: &['"'],
    char_literals: false,
};

const MARKUP: CommentSyntax = CommentSyntax {
    line: &[],
    block: &[("<!--", "-->"), ("/*", "*/")],
    strings: &[],
    char_literals: false,
};

const NONE: CommentSyntax = CommentSyntax {
    line: &[],
    block: &[],
    strings: &[],
    char_literals: false,
};

impl Default for CommentSyntax {
    fn default() -> Self {
        NONE
    }
}

impl CommentSyntax {
    /// Pick the syntax for a file by its extension.
    pub fn for_path(path: Option<&Path>) -> Self {
        let ext = path
            .and_then(|p| p.extension())
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "rs" => RUST,
            "c" | "h" | "cc" | "cpp" | "hpp" | "cxx" | "go" | "java" | "kt" | "swift" | "cs"
            | "scala" | "js" | "jsx" | "ts" | "tsx" | "dart" | "zig" => C_FAMILY,
            "py" | "rb" | "sh" | "bash" | "zsh" | "pl" | "r" | "toml" | "yaml" | "yml"
            | "conf" | "mk" | "cmake" | "nix" => HASH,
            "lua" | "sql" | "hs" | "elm" => DASH_DASH,
            "el" | "lisp" | "clj" | "cljs" | "scm" | "rkt" => LISP,
            "html" | "htm" | "xml" | "md" | "css" | "vue" | "svelte" => MARKUP,
            _ => NONE,
        }
    }

    /// True when the language has no comment delimiters at all.
    pub fn is_none(&self) -> bool {
        self.line.is_empty() && self.block.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lex {
    Code,
    Str(char),
    LineComment,
    BlockComment(&'static str),
}

/// Forward-only lexer over one text.
pub struct SyntaxCursor<'a> {
    syntax: CommentSyntax,
    text: &'a str,
    pos: usize,
    state: Lex,
}

impl<'a> SyntaxCursor<'a> {
    pub fn new(syntax: CommentSyntax, text: &'a str) -> Self {
        Self {
            syntax,
            text,
            pos: 0,
            state: Lex::Code,
        }
    }

    /// Whether `pos` lies inside a comment. Positions must be char
    /// boundaries; querying backwards restarts the walk.
    pub fn in_comment(&mut self, pos: usize) -> bool {
        if pos < self.pos {
            self.pos = 0;
            self.state = Lex::Code;
        }
        self.advance_to(pos.min(self.text.len()));
        matches!(self.state, Lex::LineComment | Lex::BlockComment(_))
    }

    fn advance_to(&mut self, target: usize) {
        while self.pos < target {
            let rest = &self.text[self.pos..];
            let Some(ch) = rest.chars().next() else {
                break;
            };
            match self.state {
                Lex::Code => {
                    // block openers first: Lua's `--[[` also starts with `--`
                    if let Some((open, close)) =
                        self.syntax.block.iter().find(|(o, _)| rest.starts_with(*o))
                    {
                        self.state = Lex::BlockComment(*close);
                        self.pos += open.len();
                    } else if let Some(open) =
                        self.syntax.line.iter().find(|p| rest.starts_with(**p))
                    {
                        self.state = Lex::LineComment;
                        self.pos += open.len();
                    } else if let Some(len) = self.char_literal_len(rest) {
                        self.pos += len;
                    } else {
                        if self.syntax.strings.contains(&ch) {
                            self.state = Lex::Str(ch);
                        }
                        self.pos += ch.len_utf8();
                    }
                }
                Lex::Str(quote) => {
                    self.pos += ch.len_utf8();
                    if ch == '\\' {
                        if let Some(escaped) = self.text[self.pos..].chars().next() {
                            self.pos += escaped.len_utf8();
                        }
                    } else if ch == quote {
                        self.state = Lex::Code;
                    }
                }
                Lex::LineComment => {
                    if ch == '\n' {
                        self.state = Lex::Code;
                    }
                    self.pos += ch.len_utf8();
                }
                Lex::BlockComment(close) => {
                    if rest.starts_with(close) {
                        self.state = Lex::Code;
                        self.pos += close.len();
                    } else {
                        self.pos += ch.len_utf8();
                    }
                }
            }
        }
    }
}

impl SyntaxCursor<'_> {
    /// Byte length of a character literal such as `'"'` or `'\''` at the
    /// start of `rest`. Lifetimes (`'a`) are not literals.
    fn char_literal_len(&self, rest: &str) -> Option<usize> {
        if !self.syntax.char_literals {
            return None;
        }
        let body = rest.strip_prefix('\'')?;
        let mut chars = body.char_indices();
        let (_, first) = chars.next()?;
        if first == '\\' {
            chars.next()?;
            // longest escape is `\u{10FFFF}`
            let (close, _) = chars
                .take(9)
                .take_while(|(_, c)| *c != '\n')
                .find(|(_, c)| *c == '\'')?;
            return Some(1 + close + 1);
        }
        let (i, next) = chars.next()?;
        (first != '\n' && next == '\'').then_some(1 + i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_comment(ext: &str, text: &str, needle: &str) -> bool {
        let syntax = CommentSyntax::for_path(Some(Path::new(&format!("f.{ext}"))));
        let pos = text.find(needle).expect("needle present");
        SyntaxCursor::new(syntax, text).in_comment(pos)
    }

    #[test]
    fn test_line_comment() {
        assert!(in_comment("rs", "fn a() {} // TODO: x\n", "TODO"));
        assert!(!in_comment("rs", "let TODO = 1; // note\n", "TODO"));
    }

    #[test]
    fn test_line_comment_ends_at_newline() {
        assert!(!in_comment("py", "# comment\nTODO = 1\n", "TODO"));
    }

    #[test]
    fn test_block_comment() {
        let text = "int a; /* first\n   FIXME later */ int FIXME_NOT;";
        assert!(in_comment("c", text, "FIXME later"));
        assert!(!in_comment("c", text, "FIXME_NOT"));
    }

    #[test]
    fn test_string_hides_comment_opener() {
        assert!(!in_comment("js", "let s = \"// TODO\";", "TODO"));
        assert!(!in_comment("py", "s = 'a # TODO'", "TODO"));
    }

    #[test]
    fn test_escaped_quote_stays_in_string() {
        assert!(!in_comment("c", "char *s = \"\\\" // TODO\";", "TODO"));
    }

    #[test]
    fn test_rust_lifetime_is_not_a_string() {
        assert!(in_comment("rs", "fn f<'a>(x: &'a str) {} // TODO here", "TODO"));
    }

    #[test]
    fn test_rust_char_literals_do_not_open_strings() {
        assert!(in_comment("rs", "let q = '\"';\n// TODO: after a quote char\n", "TODO"));
        assert!(in_comment("rs", "let q = b'\"';\n// TODO: byte literal\n", "TODO"));
        assert!(in_comment("rs", "let e = '\\'';\nlet u = '\\u{1F600}';\n// TODO: escapes\n", "TODO"));
        assert!(in_comment("rs", "let c = 'é'; // TODO: wide\n", "TODO"));
        assert!(!in_comment("rs", "let s = \"'\"; let t = \"// TODO\";\n", "TODO"));
    }

    #[test]
    fn test_lua_block_comment() {
        let text = "--[[\nTODO: inside block\n]]\nlocal TODO_NOT = 1 -- FIXME: line\n";
        assert!(in_comment("lua", text, "TODO: inside"));
        assert!(!in_comment("lua", text, "TODO_NOT"));
        assert!(in_comment("lua", text, "FIXME"));
    }

    #[test]
    fn test_unknown_extension_has_no_comments() {
        assert!(CommentSyntax::for_path(Some(Path::new("x.unknown"))).is_none());
        assert!(!in_comment("unknown", "// TODO", "TODO"));
    }

    #[test]
    fn test_cursor_restarts_when_moving_backwards() {
        let text = "// TODO one\ncode TODO\n";
        let mut cursor = SyntaxCursor::new(RUST, text);
        let second = text.rfind("TODO").unwrap();
        assert!(!cursor.in_comment(second));
        assert!(cursor.in_comment(3));
    }
}
