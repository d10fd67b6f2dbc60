//! Optional source transforms applied before parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static LOG_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:console|logger|log)\.(?:log|debug|trace|info)\s*\(.*\)\s*;?\s*$")
        .expect("valid log statement regex")
});

/// Comments that carry instructions for tools and must survive pruning
static DIRECTIVE_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*//\s*(?:@ts-|eslint|prettier|istanbul|#\s*source|/\s*<reference)")
        .expect("valid directive regex")
});

/// Rewrites a document's text before it reaches the parser.
pub trait Preprocessor: Send + Sync {
    /// Return the text to chunk; borrow the input when nothing changes
    fn preprocess<'a>(&self, source: &'a str) -> Cow<'a, str>;
}

/// Removes noise lines that rarely help retrieval.
///
/// Works line by line, so multi-line log calls are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenoisePreprocessor {
    /// Drop single-line `console.log(...)`-style statements
    pub strip_log_statements: bool,
    /// Drop full-line `//` comments (JSDoc blocks and tool directives stay)
    pub prune_line_comments: bool,
}

impl Default for DenoisePreprocessor {
    fn default() -> Self {
        Self {
            strip_log_statements: true,
            prune_line_comments: false,
        }
    }
}

impl DenoisePreprocessor {
    fn drops(&self, line: &str) -> bool {
        if self.strip_log_statements && LOG_STATEMENT.is_match(line) {
            return true;
        }
        self.prune_line_comments
            && line.trim_start().starts_with("//")
            && !DIRECTIVE_COMMENT.is_match(line)
    }
}

impl Preprocessor for DenoisePreprocessor {
    fn preprocess<'a>(&self, source: &'a str) -> Cow<'a, str> {
        if !source.split_inclusive('\n').any(|line| self.drops(line)) {
            return Cow::Borrowed(source);
        }

        let kept: String = source
            .split_inclusive('\n')
            .filter(|line| !self.drops(line))
            .collect();
        log::debug!("denoise removed {} bytes", source.len() - kept.len());
        Cow::Owned(kept)
    }
}
