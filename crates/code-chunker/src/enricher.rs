//! Final metadata for emitted chunks.
//!
//! Names and kinds come from unit provenance when a chunk still carries it.
//! Chunks cut by statement, line or token windows have none; for those the
//! regexes below give a best-effort answer and may miss unusual declarations.

use crate::imports::has_import_line;
use crate::text::{is_blank_or_comment, mask_strings_and_comments};
use crate::token_counter::TokenCounter;
use crate::types::{Chunk, ChunkMetadata, DraftChunk, SemanticType, SourceDocument, UnitKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound of `complexity_score`
pub const MAX_COMPLEXITY: u32 = 50;

static CLASS_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+(?:default\s+)?)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)")
        .expect("valid class regex")
});

static FUNCTION_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
    )
    .expect("valid function regex")
});

static ARROW_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
    )
    .expect("valid arrow regex")
});

static EXPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:export\b|module\.exports\b|exports\.[A-Za-z_$])").expect("valid export regex")
});

static LOOP_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:for|while|do)\b").expect("valid loop regex"));

static BRANCH_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:if|case|catch)\b|&&|\|\||\?\?").expect("valid branch regex"));

/// Turns draft chunks into frozen [`Chunk`]s
pub(crate) struct MetadataEnricher<'a> {
    counter: &'a TokenCounter,
}

impl<'a> MetadataEnricher<'a> {
    pub const fn new(counter: &'a TokenCounter) -> Self {
        Self { counter }
    }

    pub fn enrich(&self, drafts: Vec<DraftChunk>, document: &SourceDocument) -> Vec<Chunk> {
        let total_chunks = drafts.len();
        drafts
            .into_iter()
            .enumerate()
            .map(|(chunk_index, draft)| {
                let (function_names, class_names) = names(&draft);
                let (split_part, split_total) = draft.split.unzip();
                let metadata = ChunkMetadata {
                    source_path: document.source_path.clone(),
                    chunk_index,
                    total_chunks,
                    token_count: self.counter.count(&draft.content),
                    semantic_type: semantic_type(&draft),
                    splitting_method: draft.method,
                    split_part,
                    split_total,
                    function_names,
                    class_names,
                    parent_scope: parent_scope(&draft),
                    complexity_score: complexity_score(&draft.content),
                    has_imports: has_import_line(&draft.content),
                    has_exports: EXPORT_LINE.is_match(&draft.content),
                    injected_imports: draft.injected_imports,
                    is_atomic: draft.atomic,
                    extra: document.metadata.clone(),
                };
                Chunk {
                    content: draft.content,
                    metadata,
                }
            })
            .collect()
    }
}

fn semantic_type(draft: &DraftChunk) -> SemanticType {
    let mut kinds = draft
        .units
        .iter()
        .map(|unit| SemanticType::from_unit_kind(unit.kind));
    match kinds.next() {
        Some(first) if kinds.all(|kind| kind == first) => first,
        Some(_) => SemanticType::Mixed,
        None => classify_text(&draft.content),
    }
}

/// Regex classification for chunks without provenance
fn classify_text(content: &str) -> SemanticType {
    if content.lines().all(is_blank_or_comment) {
        return SemanticType::Documentation;
    }

    let has_class = CLASS_DECL.is_match(content);
    let has_function = FUNCTION_DECL.is_match(content) || ARROW_DECL.is_match(content);
    match (has_class, has_function) {
        (true, true) => SemanticType::Mixed,
        (true, false) => SemanticType::Class,
        (false, true) => SemanticType::Function,
        (false, false) if EXPORT_LINE.is_match(content) => SemanticType::Export,
        (false, false) if has_import_line(content) => SemanticType::Import,
        (false, false) => SemanticType::CodeBlock,
    }
}

/// `(function_names, class_names)` in order of appearance, without repeats
fn names(draft: &DraftChunk) -> (Vec<String>, Vec<String>) {
    let mut functions = Vec::new();
    let mut classes = Vec::new();

    for unit in &draft.units {
        match unit.kind {
            kind if kind.is_function_like() => push_unique(&mut functions, &unit.name),
            UnitKind::Class => push_unique(&mut classes, &unit.name),
            _ => {}
        }
    }

    // Export and call units do not say what they wrap; neither do windows.
    let opaque = draft.units.is_empty()
        || draft
            .units
            .iter()
            .any(|unit| matches!(unit.kind, UnitKind::Export | UnitKind::CallExpressionMatch));
    if opaque {
        for caps in FUNCTION_DECL.captures_iter(&draft.content).chain(ARROW_DECL.captures_iter(&draft.content)) {
            push_unique(&mut functions, &caps[1]);
        }
        for caps in CLASS_DECL.captures_iter(&draft.content) {
            push_unique(&mut classes, &caps[1]);
        }
    }

    (functions, classes)
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|existing| existing == name) {
        names.push(name.to_string());
    }
}

/// Class owning the chunk's methods, when exactly one does
fn parent_scope(draft: &DraftChunk) -> Option<String> {
    let mut parents = draft.units.iter().filter_map(|unit| unit.parent.as_deref());
    let first = parents.next()?;
    parents.all(|parent| parent == first).then(|| first.to_string())
}

/// Weighted branch count over code with strings and comments blanked out.
///
/// Loops weigh 2; `if`, `case`, `catch`, `&&`, `||`, `??` and ternaries weigh 1.
pub fn complexity_score(content: &str) -> u32 {
    let masked = mask_strings_and_comments(content);
    let loops = LOOP_KEYWORD.find_iter(&masked).count();
    let branches = BRANCH_KEYWORD.find_iter(&masked).count();
    let score = 1 + 2 * loops + branches + ternaries(&masked);
    u32::try_from(score).unwrap_or(MAX_COMPLEXITY).min(MAX_COMPLEXITY)
}

/// `?` that is not part of `?.`, `??` or an optional annotation (`x?:`, `x?)`)
fn ternaries(masked: &str) -> usize {
    let bytes = masked.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|&(idx, &byte)| {
            if byte != b'?' {
                return false;
            }
            let prev = idx.checked_sub(1).map(|i| bytes[i]);
            let next = bytes.get(idx + 1).copied();
            prev != Some(b'?') && !matches!(next, Some(b'.' | b'?' | b':' | b')' | b',' | b'='))
        })
        .count()
}
