//! Four-tier recovery for chunks over the token budget.
//!
//! ```text
//! oversized draft
//!     ├─> tier 1  re-parse, split containers into members, re-pack
//!     ├─> tier 2  cut between statements nearest the midpoint
//!     ├─> tier 3  line window cut at blank/comment/closing/declaration lines
//!     └─> tier 4  token windows with overlap (always terminates)
//! ```
//!
//! The first tier producing two or more parts wins. Parts still over budget
//! continue at the next tier, never the same one.

use crate::assembler::{plan_finest, ChunkAssembler};
use crate::extractor::SemanticUnitExtractor;
use crate::framework::FrameworkPatternMatcher;
use crate::parser::{CodeParser, ParsedSource};
use crate::text::{is_blank_or_comment, is_closing_line, starts_declaration, LineIndex};
use crate::token_counter::{TokenCounter, CHARS_PER_TOKEN};
use crate::types::{DraftChunk, SplittingMethod};
use std::time::Instant;
use tree_sitter::Node;

/// Nodes whose children are statements or members
const BLOCK_KINDS: &[&str] = &["statement_block", "class_body"];

/// Fields leading from a wrapper node towards its block
const WRAPPER_FIELDS: &[&str] = &["body", "declaration", "value"];

/// Bisection descends at most this far into a lone statement
const MAX_BODY_DEPTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Resegment = 1,
    Bisect = 2,
    LineWindow = 3,
    TokenWindow = 4,
}

impl Tier {
    const fn next(self) -> Option<Self> {
        match self {
            Self::Resegment => Some(Self::Bisect),
            Self::Bisect => Some(Self::LineWindow),
            Self::LineWindow => Some(Self::TokenWindow),
            Self::TokenWindow => None,
        }
    }

    const fn method(self) -> SplittingMethod {
        match self {
            Self::Resegment => SplittingMethod::Resegment,
            Self::Bisect => SplittingMethod::StatementBisection,
            Self::LineWindow => SplittingMethod::LineWindow,
            Self::TokenWindow => SplittingMethod::TokenWindow,
        }
    }
}

pub(crate) struct OversizeRecoveryCascade<'a> {
    counter: &'a TokenCounter,
    parser: CodeParser,
    matcher: &'a FrameworkPatternMatcher,
    max_units: usize,
    overlap_tokens: usize,
    separators: &'a [String],
    deadline: Option<Instant>,
}

impl<'a> OversizeRecoveryCascade<'a> {
    pub const fn new(
        counter: &'a TokenCounter,
        parser: CodeParser,
        matcher: &'a FrameworkPatternMatcher,
        max_units: usize,
        overlap_tokens: usize,
        separators: &'a [String],
    ) -> Self {
        Self {
            counter,
            parser,
            matcher,
            max_units,
            overlap_tokens,
            separators,
            deadline: None,
        }
    }

    /// Skip straight to token windows once `deadline` passes
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    fn over_budget(&self, text: &str) -> bool {
        self.counter.count(text) > self.counter.max_tokens()
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Split an oversized draft; parts are tagged `split_part / split_total`.
    pub fn split(&self, draft: DraftChunk) -> Vec<DraftChunk> {
        if !self.over_budget(&draft.content) {
            return vec![draft];
        }

        let mut parts = self.recover(draft, Tier::Resegment);
        let total = parts.len();
        for (idx, part) in parts.iter_mut().enumerate() {
            part.split = Some((idx + 1, total));
        }
        parts
    }

    /// Tier 4 on a whole text, used when a document cannot be parsed
    pub fn token_windows(&self, text: &str) -> Vec<DraftChunk> {
        let mut parts: Vec<DraftChunk> = self
            .windows(text)
            .into_iter()
            .map(|window| DraftChunk::raw(window, SplittingMethod::TokenWindow))
            .collect();
        let total = parts.len();
        if total > 1 {
            for (idx, part) in parts.iter_mut().enumerate() {
                part.split = Some((idx + 1, total));
            }
        }
        parts
    }

    fn recover(&self, draft: DraftChunk, from: Tier) -> Vec<DraftChunk> {
        let mut tier = from;
        loop {
            if tier != Tier::TokenWindow && self.expired() {
                log::debug!("split deadline passed; jumping to token windows");
                tier = Tier::TokenWindow;
            }

            let parts = self.run_tier(tier, &draft);
            if parts.len() >= 2 || (tier == Tier::TokenWindow && !parts.is_empty()) {
                log::debug!("tier {} split {} bytes into {} parts", tier as u8, draft.content.len(), parts.len());
                return parts
                    .into_iter()
                    .flat_map(|part| match tier.next() {
                        Some(next) if !part.atomic && self.over_budget(&part.content) => {
                            self.recover(part, next)
                        }
                        _ => vec![part],
                    })
                    .collect();
            }

            match tier.next() {
                Some(next) => tier = next,
                None => return vec![draft],
            }
        }
    }

    fn run_tier(&self, tier: Tier, draft: &DraftChunk) -> Vec<DraftChunk> {
        let text = draft.content.as_str();
        match tier {
            Tier::Resegment => self.resegment(text),
            Tier::Bisect => raw_parts(self.bisect(text), tier),
            Tier::LineWindow => raw_parts(self.line_window(text), tier),
            Tier::TokenWindow => raw_parts(self.windows(text), tier),
        }
    }

    fn resegment(&self, text: &str) -> Vec<DraftChunk> {
        let parsed = match self.parser.parse(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("resegment skipped: {e}");
                return Vec::new();
            }
        };

        let extraction = SemanticUnitExtractor::new(self.matcher, self.counter).extract(&parsed);
        let segments = plan_finest(text, &extraction.units);
        if segments.len() < 2 {
            return Vec::new();
        }

        let mut parts = ChunkAssembler::new(self.counter, self.max_units).pack(segments);
        for part in &mut parts {
            part.method = SplittingMethod::Resegment;
        }
        parts
    }

    /// Cut once, at the statement boundary closest to the middle.
    fn bisect(&self, text: &str) -> Vec<String> {
        let Ok(parsed) = self.parser.parse_lenient(text) else {
            return Vec::new();
        };
        let lines = LineIndex::new(text);
        let mid = text.len() / 2;

        let cut = statement_boundaries(&parsed, &lines)
            .into_iter()
            .filter(|&cut| !text[..cut].trim().is_empty() && !text[cut..].trim().is_empty())
            .min_by_key(|&cut| cut.abs_diff(mid));

        match cut {
            Some(cut) => vec![text[..cut].to_string(), text[cut..].to_string()],
            None => Vec::new(),
        }
    }

    /// Cut after roughly half a budget of characters, at the next good line.
    fn line_window(&self, text: &str) -> Vec<String> {
        let budget = ((self.counter.max_tokens() as f64 * CHARS_PER_TOKEN) / 2.0) as usize;
        let budget = budget.max(1);

        let mut parts = Vec::new();
        let mut part_start = 0;
        let mut chars = 0;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            if chars >= budget && line_start > part_start && starts_declaration(line) {
                parts.push(text[part_start..line_start].to_string());
                part_start = line_start;
                chars = 0;
            }

            chars += line.chars().count();
            if chars >= budget && (is_blank_or_comment(line) || is_closing_line(line)) {
                parts.push(text[part_start..offset].to_string());
                part_start = offset;
                chars = 0;
            }
        }

        if part_start < text.len() {
            let rest = &text[part_start..];
            match parts.last_mut() {
                Some(last) if rest.trim().is_empty() => last.push_str(rest),
                _ => parts.push(rest.to_string()),
            }
        }

        parts
    }

    /// Token windows, each prefixed with the tail of the previous one.
    fn windows(&self, text: &str) -> Vec<String> {
        let max = self.counter.max_tokens();
        let mut windows = Vec::new();
        let mut overlap = String::new();
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            if rest.trim().is_empty() && !windows.is_empty() {
                break;
            }

            let budget = max.saturating_sub(self.counter.count(&overlap)).max(1);
            let body = self.counter.extract_window(rest, budget, self.separators);
            pos += body.len();

            let mut window = format!("{overlap}{body}");
            if !overlap.is_empty() && self.counter.count(&window) > max {
                window = body.to_string();
            }

            overlap = self.counter.extract_overlap(&window, self.overlap_tokens).to_string();
            windows.push(window);
        }

        windows
    }
}

fn raw_parts(parts: Vec<String>, tier: Tier) -> Vec<DraftChunk> {
    parts
        .into_iter()
        .map(|part| DraftChunk::raw(part, tier.method()))
        .collect()
}

/// Byte offsets where statements (with their leading comments) begin.
///
/// A text holding a single statement is searched inside that statement's block.
fn statement_boundaries(parsed: &ParsedSource<'_>, lines: &LineIndex<'_>) -> Vec<usize> {
    let mut scope = parsed.root();
    for _ in 0..MAX_BODY_DEPTH {
        let statements = statements_of(scope);
        if statements.len() >= 2 {
            return statements
                .iter()
                .map(|node| lines.start(lines.leading_run(node.start_position().row)))
                .collect();
        }
        match statements.first().and_then(|only| inner_block(*only)) {
            Some(block) => scope = block,
            None => break,
        }
    }
    Vec::new()
}

fn statements_of(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let statements: Vec<_> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    statements
}

/// First statement block reachable through wrappers (exports, declarators,
/// assignments, call arguments).
fn inner_block(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    for _ in 0..MAX_BODY_DEPTH {
        if BLOCK_KINDS.contains(&current.kind()) {
            return Some(current);
        }
        current = unwrap_once(current)?;
    }
    None
}

fn unwrap_once(node: Node<'_>) -> Option<Node<'_>> {
    if let Some(child) = WRAPPER_FIELDS
        .iter()
        .find_map(|field| node.child_by_field_name(field))
    {
        return Some(child);
    }

    match node.kind() {
        "expression_statement" | "await_expression" | "parenthesized_expression"
        | "lexical_declaration" | "variable_declaration" => node.named_child(0),
        "assignment_expression" => node.child_by_field_name("right"),
        "call_expression" => node.child_by_field_name("arguments").and_then(|args| {
            let mut cursor = args.walk();
            let last = args.named_children(&mut cursor).last();
            last
        }),
        _ => None,
    }
}
