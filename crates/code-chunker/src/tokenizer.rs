//! Tokenizer collaborators.
//!
//! The engine only needs `encode`/`decode`; implementations must be pure and
//! reentrant so one instance can be shared across threads behind an `Arc`.

use crate::error::{ChunkerError, Result};
use std::path::Path;
use tiktoken_rs::CoreBPE;

/// BPE-style tokenizer shared read-only by every split
pub trait Tokenizer: Send + Sync {
    /// Text to token ids
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Token ids back to text
    fn decode(&self, ids: &[u32]) -> Result<String>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// OpenAI `cl100k_base` encoding, bundled with `tiktoken-rs`
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    /// Load the bundled `cl100k_base` ranks
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| ChunkerError::tokenization(format!("cl100k_base load failed: {e}")))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self
            .bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|id| id as u32)
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.bpe
            .decode(ids.iter().map(|&id| id as _).collect())
            .map_err(|e| ChunkerError::tokenization(format!("cl100k_base decode failed: {e}")))
    }

    fn name(&self) -> &str {
        "cl100k_base"
    }
}

/// A HuggingFace `tokenizer.json`, typically the embedding model's own
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    name: String,
}

impl HfTokenizer {
    /// Load a serialized tokenizer from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            ChunkerError::tokenization(format!("Tokenizer load failed ({}): {e}", path.display()))
        })?;
        Ok(Self {
            inner,
            name: path.display().to_string(),
        })
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ChunkerError::tokenization(format!("encode failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| ChunkerError::tokenization(format!("decode failed: {e}")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
