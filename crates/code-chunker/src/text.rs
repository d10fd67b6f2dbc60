//! String- and comment-aware helpers over raw source text.
//!
//! These are lexical approximations for JavaScript-family syntax. Regex
//! literals are not recognised.

use once_cell::sync::Lazy;
use regex::Regex;

static DECLARATION_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:export\s+(?:default\s+)?)?(?:async\s+)?(?:function\b|class\b|const\b|let\b|var\b|interface\b|type\s+\w|enum\b|abstract\s+class\b|module\.exports\b)",
    )
    .expect("valid declaration regex")
});

/// Largest char boundary `<= idx`
#[must_use]
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut idx = idx;
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest char boundary `>= idx`
#[must_use]
pub fn ceil_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut idx = idx;
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Line made only of comment syntax (`//`, `/*`, `*`, `*/`)
#[must_use]
pub fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

/// Blank or comment line
#[must_use]
pub fn is_blank_or_comment(line: &str) -> bool {
    line.trim().is_empty() || is_comment_line(line)
}

/// Line that only closes a block: `}`, `};`, `})`, `});`, `]`, ...
#[must_use]
pub fn is_closing_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.starts_with(['}', ')', ']'])
        && trimmed
            .chars()
            .all(|ch| matches!(ch, '}' | ')' | ']' | ';' | ','))
}

/// Line that opens a new top-level declaration
#[must_use]
pub fn starts_declaration(line: &str) -> bool {
    !line.starts_with([' ', '\t']) && DECLARATION_START.is_match(line)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Replace the bodies of string literals and comments with spaces.
///
/// Delimiters and newlines are preserved, so byte offsets and line numbers of
/// the result match the input.
#[must_use]
pub fn mask_strings_and_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = Lexical::Code;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            Lexical::Code => match ch {
                '"' | '\'' | '`' => {
                    state = Lexical::Quoted(ch);
                    out.push(ch);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = Lexical::LineComment;
                    out.push_str("  ");
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = Lexical::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(ch),
            },
            Lexical::Quoted(quote) => {
                if ch == '\\' {
                    out.push(' ');
                    if let Some(escaped) = chars.next() {
                        push_masked(&mut out, escaped);
                    }
                } else if ch == quote {
                    state = Lexical::Code;
                    out.push(ch);
                } else if ch == '\n' && quote != '`' {
                    // Unterminated literal: resume scanning code on the next line.
                    state = Lexical::Code;
                    out.push('\n');
                } else {
                    push_masked(&mut out, ch);
                }
            }
            Lexical::LineComment => {
                if ch == '\n' {
                    state = Lexical::Code;
                    out.push('\n');
                } else {
                    push_masked(&mut out, ch);
                }
            }
            Lexical::BlockComment => {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = Lexical::Code;
                    out.push_str("  ");
                } else {
                    push_masked(&mut out, ch);
                }
            }
        }
    }

    out
}

fn push_masked(out: &mut String, ch: char) {
    if ch == '\n' {
        out.push('\n');
    } else {
        for _ in 0..ch.len_utf8() {
            out.push(' ');
        }
    }
}

/// Brackets balance once string and comment contents are ignored
#[must_use]
pub fn is_balanced(text: &str) -> bool {
    let masked = mask_strings_and_comments(text);
    let mut stack = Vec::new();

    for ch in masked.chars() {
        match ch {
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return false;
                }
            }
            _ => {}
        }
    }

    stack.is_empty()
}

/// Byte offsets of line starts, for row-based lookups
pub(crate) struct LineIndex<'s> {
    source: &'s str,
    starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    pub fn new(source: &'s str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { source, starts }
    }

    /// Byte offset where `row` (0-based) begins
    pub fn start(&self, row: usize) -> usize {
        self.starts.get(row).copied().unwrap_or(self.source.len())
    }

    /// Text of `row` without its line terminator
    pub fn line(&self, row: usize) -> &'s str {
        let start = self.start(row);
        let end = self.start(row + 1).min(self.source.len());
        self.source[start..end].trim_end_matches(['\n', '\r'])
    }

    /// First row of the blank/comment run directly above `row`
    pub fn leading_run(&self, row: usize) -> usize {
        let mut first = row;
        while first > 0 && is_blank_or_comment(self.line(first - 1)) {
            first -= 1;
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn braces_inside_strings_are_ignored() {
        let code = r#"const t = "use {curly} in string"; function f(){ return 1; }"#;
        assert!(is_balanced(code));
    }

    #[test]
    fn braces_inside_comments_and_templates_are_ignored() {
        let code = "// {\nconst s = `${a} {`; /* ) */ f(s);";
        assert!(is_balanced(code));
    }

    #[test]
    fn unbalanced_code_is_detected() {
        assert!(!is_balanced("function f() { if (x) { return 1; }"));
        assert!(!is_balanced("call(a]"));
    }

    #[test]
    fn masking_preserves_offsets() {
        let code = "a = 'x{y}'; // }\nb();";
        let masked = mask_strings_and_comments(code);
        assert_eq!(masked.len(), code.len());
        assert_eq!(masked.lines().count(), code.lines().count());
        assert!(!masked.contains('{'));
        assert!(masked.contains("b();"));
    }

    #[test]
    fn escaped_quotes_stay_inside_string() {
        assert!(is_balanced(r#"const q = "a \" { b"; g();"#));
    }

    #[test]
    fn char_boundaries() {
        let text = "aé€b";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(ceil_char_boundary(text, 2), 3);
        assert_eq!(floor_char_boundary(text, 100), text.len());
    }

    #[test]
    fn line_classifiers() {
        assert!(is_comment_line("   // note"));
        assert!(is_comment_line(" * @param x"));
        assert!(is_blank_or_comment("   "));
        assert!(is_closing_line("  });"));
        assert!(is_closing_line("}"));
        assert!(!is_closing_line("} else {"));
        assert!(starts_declaration("export async function run() {"));
        assert!(starts_declaration("class Foo {"));
        assert!(starts_declaration("module.exports = function (app) {"));
        assert!(!starts_declaration("  const nested = 1;"));
        assert!(!starts_declaration("constant();"));
    }

    #[test]
    fn line_index_rows_and_runs() {
        let source = "a();\n\n// doc\nfunction f() {}\n";
        let index = LineIndex::new(source);
        assert_eq!(index.line(2), "// doc");
        assert_eq!(index.start(3), 13);
        assert_eq!(index.leading_run(3), 1);
        assert_eq!(index.leading_run(0), 0);
    }
}
