//! # Semantic Code Chunker
//!
//! Syntax-aware chunking of JavaScript and TypeScript sources for embedding
//! and retrieval.
//!
//! ## Philosophy
//!
//! Chunks should follow the code's own structure:
//! - Units are whole declarations (classes, functions, exports, framework calls)
//! - Every chunk fits the token budget, except framework calls marked atomic
//! - Oversized code is split by the gentlest method that works
//! - Identical input and configuration give byte-identical output
//!
//! ## Architecture
//!
//! ```text
//! SourceDocument
//!     │
//!     ├──> Preprocessor (optional de-noising)
//!     │
//!     ├──> Tree-sitter Parsing → syntax tree
//!     │
//!     ├──> Unit Extraction
//!     │    ├─> Top-level declarations and framework calls
//!     │    ├─> Members of oversized classes
//!     │    └─> File-wide import pool
//!     │
//!     ├──> Assembly (greedy packing under the token budget)
//!     │
//!     ├──> Optimization
//!     │    ├─> Merge small neighbours
//!     │    ├─> Split oversized chunks (4-tier cascade)
//!     │    ├─> Drop duplicates
//!     │    └─> Restore referenced imports
//!     │
//!     └──> Metadata Enrichment → Chunk[]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use semantic_code_chunker::{ChunkerConfig, SemanticChunkingEngine, SourceDocument};
//!
//! let engine = SemanticChunkingEngine::with_tokenizer(ChunkerConfig::default(), None).unwrap();
//!
//! let code = r#"
//! export function add(a, b) {
//!   return a + b;
//! }
//! "#;
//!
//! let chunks = engine.split(&SourceDocument::new(code, "math.js"));
//! for chunk in &chunks {
//!     println!("#{} ({} tokens): {:?}",
//!              chunk.metadata.chunk_index, chunk.metadata.token_count, chunk.metadata.function_names);
//! }
//! ```

mod assembler;
mod cascade;
mod config;
mod engine;
mod enricher;
mod error;
mod extractor;
mod framework;
mod imports;
mod language;
mod optimizer;
mod parser;
mod preprocess;
pub mod text;
mod token_counter;
mod tokenizer;
mod types;

pub use config::ChunkerConfig;
pub use engine::{ChunkingStats, SemanticChunkingEngine};
pub use enricher::{complexity_score, MAX_COMPLEXITY};
pub use error::{ChunkerError, Result};
pub use extractor::{Extraction, SemanticUnitExtractor};
pub use framework::{CallMatch, FrameworkPack, FrameworkPatternMatcher, FrameworkRule};
pub use imports::{has_import_line, ImportEntry};
pub use language::Language;
pub use parser::{CodeParser, ParsedSource};
pub use preprocess::{DenoisePreprocessor, Preprocessor};
pub use token_counter::{estimate_tokens, TokenCounter, CHARS_PER_TOKEN};
pub use tokenizer::{HfTokenizer, TiktokenTokenizer, Tokenizer};
pub use types::{
    Chunk, ChunkMetadata, SemanticType, SemanticUnit, SourceDocument, SplittingMethod,
    TokenAnalysis, UnitKind,
};
