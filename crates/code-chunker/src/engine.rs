use crate::assembler::ChunkAssembler;
use crate::cascade::OversizeRecoveryCascade;
use crate::config::ChunkerConfig;
use crate::enricher::MetadataEnricher;
use crate::error::Result;
use crate::extractor::SemanticUnitExtractor;
use crate::framework::FrameworkPatternMatcher;
use crate::language::Language;
use crate::optimizer::QualityOptimizer;
use crate::parser::CodeParser;
use crate::preprocess::Preprocessor;
use crate::token_counter::TokenCounter;
use crate::tokenizer::{TiktokenTokenizer, Tokenizer};
use crate::types::{Chunk, SourceDocument};
use std::sync::Arc;
use std::time::Instant;

/// Splits source documents into bounded, semantically coherent chunks.
///
/// Holds only read-only state, so one engine can serve many threads.
pub struct SemanticChunkingEngine {
    config: ChunkerConfig,
    counter: TokenCounter,
    matcher: FrameworkPatternMatcher,
    preprocessor: Option<Box<dyn Preprocessor>>,
}

impl SemanticChunkingEngine {
    /// Validate `config`, compile framework rules and load the default
    /// `cl100k_base` tokenizer.
    ///
    /// A tokenizer that fails to load is logged and replaced by the
    /// character-ratio estimate.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        let tokenizer: Option<Arc<dyn Tokenizer>> = match TiktokenTokenizer::cl100k() {
            Ok(tokenizer) => Some(Arc::new(tokenizer)),
            Err(e) => {
                log::warn!("{e}; counting tokens by character ratio");
                None
            }
        };
        Self::with_tokenizer(config, tokenizer)
    }

    /// Build an engine around an explicit tokenizer (`None` = heuristic counts)
    pub fn with_tokenizer(
        config: ChunkerConfig,
        tokenizer: Option<Arc<dyn Tokenizer>>,
    ) -> Result<Self> {
        config.validate()?;
        let matcher = FrameworkPatternMatcher::new(&config.framework_rules, &config.framework_packs)?;
        let counter = TokenCounter::new(tokenizer, config.min_tokens, config.max_tokens);

        log::debug!(
            "engine ready: max_tokens={} min_tokens={} overlap={} rules={}",
            config.max_tokens,
            config.min_tokens,
            config.overlap_tokens,
            if matcher.is_empty() { "none" } else { "configured" }
        );

        Ok(Self {
            config,
            counter,
            matcher,
            preprocessor: None,
        })
    }

    /// Builder: transform document text before parsing
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessor = Some(Box::new(preprocessor));
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    #[must_use]
    pub const fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Split a document into ordered chunks.
    ///
    /// Never fails: unparseable text is cut into token windows and empty
    /// input yields no chunks.
    pub fn split(&self, document: &SourceDocument) -> Vec<Chunk> {
        self.run(document, None)
    }

    /// Like [`split`](Self::split), but once `deadline` passes oversized
    /// chunks go straight to token windows.
    pub fn split_until(&self, document: &SourceDocument, deadline: Instant) -> Vec<Chunk> {
        self.run(document, Some(deadline))
    }

    fn run(&self, document: &SourceDocument, deadline: Option<Instant>) -> Vec<Chunk> {
        let content = match &self.preprocessor {
            Some(preprocessor) => preprocessor.preprocess(&document.content),
            None => std::borrow::Cow::Borrowed(document.content.as_str()),
        };
        if content.trim().is_empty() {
            return Vec::new();
        }

        let language = Language::from_path(&document.source_path);
        let parser = CodeParser::new(language);
        let cascade = OversizeRecoveryCascade::new(
            &self.counter,
            parser,
            &self.matcher,
            self.config.max_units_per_chunk,
            self.config.overlap_tokens,
            &self.config.window_separators,
        )
        .with_deadline(deadline);
        let assembler = ChunkAssembler::new(&self.counter, self.config.max_units_per_chunk);

        let (drafts, imports) = match parser.parse(&content) {
            Ok(parsed) => {
                let extraction = SemanticUnitExtractor::new(&self.matcher, &self.counter).extract(&parsed);
                log::debug!(
                    "{}: {} units, {} imports ({})",
                    document.source_path,
                    extraction.units.len(),
                    extraction.imports.len(),
                    language.as_str()
                );
                if extraction.units.is_empty() {
                    (cascade.token_windows(&content), extraction.imports)
                } else {
                    (assembler.assemble(&content, &extraction.units), extraction.imports)
                }
            }
            Err(e) => {
                log::warn!("{}: {e}; falling back to token windows", document.source_path);
                (cascade.token_windows(&content), Vec::new())
            }
        };

        let optimizer = QualityOptimizer::new(&self.counter, &assembler, &cascade)
            .dedupe(self.config.dedupe)
            .restore_imports(self.config.include_imports_in_context);
        let drafts = optimizer.optimize(drafts, &imports);

        MetadataEnricher::new(&self.counter).enrich(drafts, document)
    }

    /// Get statistics about chunking
    #[must_use]
    pub fn get_stats(chunks: &[Chunk]) -> ChunkingStats {
        let tokens = || chunks.iter().map(Chunk::token_count);
        ChunkingStats {
            total_chunks: chunks.len(),
            total_lines: chunks.iter().map(Chunk::line_count).sum(),
            total_tokens: tokens().sum(),
            avg_tokens_per_chunk: if chunks.is_empty() {
                0
            } else {
                tokens().sum::<usize>() / chunks.len()
            },
            min_tokens: tokens().min().unwrap_or(0),
            max_tokens: tokens().max().unwrap_or(0),
            split_chunks: chunks
                .iter()
                .filter(|chunk| chunk.metadata.split_part.is_some())
                .count(),
            atomic_chunks: chunks.iter().filter(|chunk| chunk.metadata.is_atomic).count(),
        }
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_lines: usize,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    /// Chunks produced by the recovery cascade
    pub split_chunks: usize,
    pub atomic_chunks: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} | Lines: {} | Tokens: {} | Avg: {} | Range: {}-{} | Split: {} | Atomic: {}",
            self.total_chunks,
            self.total_lines,
            self.total_tokens,
            self.avg_tokens_per_chunk,
            self.min_tokens,
            self.max_tokens,
            self.split_chunks,
            self.atomic_chunks
        )
    }
}
