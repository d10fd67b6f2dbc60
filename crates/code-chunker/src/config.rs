use crate::error::{ChunkerError, Result};
use crate::framework::{FrameworkPack, FrameworkRule};
use serde::{Deserialize, Serialize};

/// Configuration for semantic chunking behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum chunk size in tokens (hard limit for non-atomic chunks)
    pub max_tokens: usize,

    /// Minimum chunk size in tokens (smaller fragments get merged when possible)
    pub min_tokens: usize,

    /// Tokens shared between consecutive token-window chunks
    pub overlap_tokens: usize,

    /// Hard cap on semantic units packed into one chunk, even under budget
    pub max_units_per_chunk: usize,

    /// Custom call-expression rules
    pub framework_rules: Vec<FrameworkRule>,

    /// Built-in rule packs enabled in addition to `framework_rules`
    pub framework_packs: Vec<FrameworkPack>,

    /// Prepend the import lines a chunk depends on
    pub include_imports_in_context: bool,

    /// Drop chunks whose trimmed content repeats an earlier chunk
    pub dedupe: bool,

    /// Preferred cut points for token windows, strongest first
    pub window_separators: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            min_tokens: 64,
            overlap_tokens: 32,
            max_units_per_chunk: 8,
            framework_rules: Vec::new(),
            framework_packs: Vec::new(),
            include_imports_in_context: true,
            dedupe: true,
            window_separators: default_separators(),
        }
    }
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n}\n", ";\n", "\n", " "]
        .iter()
        .map(ToString::to_string)
        .collect()
}

impl ChunkerConfig {
    /// Create config optimized for embeddings (smaller, focused chunks)
    pub fn for_embeddings() -> Self {
        Self {
            max_tokens: 384,
            min_tokens: 48,
            overlap_tokens: 24,
            ..Default::default()
        }
    }

    /// Create config optimized for LLM context (larger, comprehensive chunks)
    pub fn for_llm_context() -> Self {
        Self {
            max_tokens: 2048,
            min_tokens: 256,
            overlap_tokens: 64,
            max_units_per_chunk: 16,
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| ChunkerError::invalid_config(format!("TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(ChunkerError::invalid_config("max_tokens must be > 0"));
        }

        if self.min_tokens > self.max_tokens {
            return Err(ChunkerError::invalid_config(format!(
                "min_tokens ({}) cannot exceed max_tokens ({})",
                self.min_tokens, self.max_tokens
            )));
        }

        if self.overlap_tokens >= self.max_tokens {
            return Err(ChunkerError::invalid_config(format!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            )));
        }

        if self.max_units_per_chunk == 0 {
            return Err(ChunkerError::invalid_config(
                "max_units_per_chunk must be > 0",
            ));
        }

        if self.window_separators.iter().any(String::is_empty) {
            return Err(ChunkerError::invalid_config(
                "window_separators cannot contain empty strings",
            ));
        }

        Ok(())
    }
}
