use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;

/// A source file handed to the engine.
///
/// Ingress accepts the alternate field names some loaders emit
/// (`pageContent`, `source`, `path`); everything downstream only sees the
/// canonical fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    /// Raw file content
    #[serde(alias = "pageContent", alias = "page_content")]
    pub content: String,

    /// Path used for language selection and copied into chunk metadata
    #[serde(default, alias = "source", alias = "path")]
    pub source_path: String,

    /// Opaque metadata carried through to every chunk
    #[serde(default, alias = "pass_through_metadata")]
    pub metadata: Map<String, Value>,
}

impl SourceDocument {
    /// Create a document without pass-through metadata
    pub fn new(content: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_path: source_path.into(),
            metadata: Map::new(),
        }
    }

    /// Builder: attach a pass-through metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Kind of a semantic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Class declaration
    Class,
    /// Function declaration
    Function,
    /// `const f = () => {}` and friends
    VariableFunction,
    /// Call expression matched by a framework rule
    CallExpressionMatch,
    /// Export statement wrapping a declaration
    Export,
    /// Member of an oversized class
    Method,
}

impl UnitKind {
    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Function => "function",
            Self::VariableFunction => "variable_function",
            Self::CallExpressionMatch => "call_expression_match",
            Self::Export => "export",
            Self::Method => "method",
        }
    }

    /// Whether the unit declares something callable
    #[must_use]
    pub const fn is_function_like(self) -> bool {
        matches!(self, Self::Function | Self::VariableFunction | Self::Method)
    }
}

/// A syntactically complete construct extracted from the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticUnit {
    pub kind: UnitKind,
    pub name: String,
    /// First line of `content` (1-indexed, includes the leading comment run)
    pub start_line: usize,
    /// Last line of the node (1-indexed, inclusive)
    pub end_line: usize,
    /// Verbatim source slice
    pub content: String,
    pub is_atomic: bool,
    /// Tree-sitter node kind the unit originates from
    pub node_kind: String,
    /// Owning class for `Method` units
    pub parent: Option<String>,
    /// Rule label for `CallExpressionMatch` units
    pub call_type: Option<String>,
    /// Byte span of `content` inside the parsed source
    pub byte_range: Range<usize>,
}

impl SemanticUnit {
    /// Whether `other` lies entirely inside this unit
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.byte_range.start <= other.byte_range.start
            && other.byte_range.end <= self.byte_range.end
            && self.byte_range != other.byte_range
    }
}

/// How a chunk was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplittingMethod {
    /// Packed from semantic units
    Semantic,
    /// Tier 1: re-parsed and re-packed
    Resegment,
    /// Tier 2: cut between top-level statements
    StatementBisection,
    /// Tier 3: cut at a heuristic line boundary
    LineWindow,
    /// Tier 4: token windows with overlap
    TokenWindow,
}

impl SplittingMethod {
    /// Cascade tier number, `None` for semantic packing
    #[must_use]
    pub const fn tier(self) -> Option<u8> {
        match self {
            Self::Semantic => None,
            Self::Resegment => Some(1),
            Self::StatementBisection => Some(2),
            Self::LineWindow => Some(3),
            Self::TokenWindow => Some(4),
        }
    }
}

/// Coarse classification of a chunk's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Class,
    Function,
    Method,
    Export,
    FrameworkCall,
    Import,
    Documentation,
    CodeBlock,
    Mixed,
}

impl SemanticType {
    /// Classification of a single unit kind
    #[must_use]
    pub const fn from_unit_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Class => Self::Class,
            UnitKind::Function | UnitKind::VariableFunction => Self::Function,
            UnitKind::Method => Self::Method,
            UnitKind::Export => Self::Export,
            UnitKind::CallExpressionMatch => Self::FrameworkCall,
        }
    }
}

/// Metadata attached to every emitted chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub source_path: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Exact token count of `content`
    pub token_count: usize,
    pub semantic_type: SemanticType,
    pub splitting_method: SplittingMethod,
    /// Position inside a cascade split group (1-indexed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_part: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_total: Option<usize>,
    pub function_names: Vec<String>,
    pub class_names: Vec<String>,
    /// Class owning the methods in this chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_scope: Option<String>,
    pub complexity_score: u32,
    pub has_imports: bool,
    pub has_exports: bool,
    /// Import declarations prepended for context
    pub injected_imports: usize,
    /// Framework-matched unit that was never merged or split
    pub is_atomic: bool,
    /// Pass-through document metadata
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// A bounded piece of a source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Number of lines in the chunk
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// Token count computed at enrichment time
    #[must_use]
    pub const fn token_count(&self) -> usize {
        self.metadata.token_count
    }
}

/// Token measurement of a piece of text against the configured budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAnalysis {
    pub token_count: usize,
    pub char_count: usize,
    pub too_small: bool,
    pub too_large: bool,
}

/// What a draft chunk remembers about the units it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnitSummary {
    pub kind: UnitKind,
    pub name: String,
    pub parent: Option<String>,
}

impl From<&SemanticUnit> for UnitSummary {
    fn from(unit: &SemanticUnit) -> Self {
        Self {
            kind: unit.kind,
            name: unit.name.clone(),
            parent: unit.parent.clone(),
        }
    }
}

/// Chunk under construction, before metadata enrichment.
///
/// Token counts are never stored here; every pass measures the current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DraftChunk {
    pub content: String,
    /// Empty when AST provenance is unavailable (token/line windows)
    pub units: Vec<UnitSummary>,
    pub atomic: bool,
    pub method: SplittingMethod,
    pub split: Option<(usize, usize)>,
    pub injected_imports: usize,
}

impl DraftChunk {
    pub fn from_unit(unit: &SemanticUnit) -> Self {
        Self {
            content: unit.content.clone(),
            units: vec![UnitSummary::from(unit)],
            atomic: unit.is_atomic,
            method: SplittingMethod::Semantic,
            split: None,
            injected_imports: 0,
        }
    }

    pub fn raw(content: impl Into<String>, method: SplittingMethod) -> Self {
        Self {
            content: content.into(),
            units: Vec::new(),
            atomic: false,
            method,
            split: None,
            injected_imports: 0,
        }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len().max(1)
    }

    /// Append another draft, keeping a line break between the two texts.
    pub fn absorb(&mut self, other: Self) {
        self.content = join_content(&self.content, &other.content);
        self.units.extend(other.units);
        self.injected_imports += other.injected_imports;
    }
}

/// Concatenate two pieces of source with exactly one line break between them.
pub(crate) fn join_content(head: &str, tail: &str) -> String {
    let mut out = String::with_capacity(head.len() + tail.len() + 1);
    out.push_str(head);
    if !head.is_empty() && !head.ends_with('\n') && !tail.starts_with('\n') {
        out.push('\n');
    }
    out.push_str(tail);
    out
}
