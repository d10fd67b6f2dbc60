use crate::error::ChunkerError;
use crate::text::{ceil_char_boundary, floor_char_boundary};
use crate::tokenizer::Tokenizer;
use crate::types::TokenAnalysis;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Average characters per token for source code, used when no tokenizer answers
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// A window is "full enough" once it reaches this share of its budget
const WINDOW_FILL_RATIO: f64 = 0.95;

/// Separator snapping only looks at the tail of a window
const SNAP_SEARCH_FRACTION: f64 = 0.30;

const MAX_ESTIMATE_ROUNDS: usize = 8;

/// Character-ratio estimate: `ceil(chars / 3.5)`
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as usize
}

/// Exact token accounting with a heuristic fallback.
///
/// Holds no per-call state: the only mutable field is the flag that keeps the
/// fallback warning to one log line per counter.
pub struct TokenCounter {
    tokenizer: Option<Arc<dyn Tokenizer>>,
    min_tokens: usize,
    max_tokens: usize,
    fallback_logged: AtomicBool,
}

impl TokenCounter {
    /// Create a counter for the `[min_tokens, max_tokens]` budget
    pub fn new(tokenizer: Option<Arc<dyn Tokenizer>>, min_tokens: usize, max_tokens: usize) -> Self {
        Self {
            tokenizer,
            min_tokens,
            max_tokens,
            fallback_logged: AtomicBool::new(false),
        }
    }

    /// Counter that only uses the character-ratio estimate
    pub fn heuristic(min_tokens: usize, max_tokens: usize) -> Self {
        Self::new(None, min_tokens, max_tokens)
    }

    #[must_use]
    pub fn has_tokenizer(&self) -> bool {
        self.tokenizer.is_some()
    }

    #[must_use]
    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    #[must_use]
    pub const fn min_tokens(&self) -> usize {
        self.min_tokens
    }

    /// Count tokens in `text`
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        if let Some(tokenizer) = &self.tokenizer {
            match tokenizer.encode(text) {
                Ok(ids) => return ids.len(),
                Err(e) => self.note_fallback(&e),
            }
        }

        estimate_tokens(text)
    }

    /// Measure `text` against the configured budget
    pub fn exceeds_limit(&self, text: &str) -> TokenAnalysis {
        let token_count = self.count(text);
        TokenAnalysis {
            token_count,
            char_count: text.chars().count(),
            too_small: token_count < self.min_tokens,
            too_large: token_count > self.max_tokens,
        }
    }

    /// Longest prefix of `text` that fits `max_tokens`, preferably ending on a separator.
    ///
    /// Returns at least one character for non-empty input so callers always
    /// make progress.
    pub fn extract_window<'a>(
        &self,
        text: &'a str,
        max_tokens: usize,
        separators: &[String],
    ) -> &'a str {
        let max_tokens = max_tokens.max(1);
        if text.is_empty() || self.count(text) <= max_tokens {
            return text;
        }

        let fill_floor = (max_tokens as f64 * WINDOW_FILL_RATIO).floor() as usize;
        let mut len = first_char_len(text)
            .max(floor_char_boundary(text, (max_tokens as f64 * CHARS_PER_TOKEN) as usize));
        let mut fit: Option<usize> = None;
        let mut over: Option<usize> = None;

        for _ in 0..MAX_ESTIMATE_ROUNDS {
            let tokens = self.count(&text[..len]);
            if tokens <= max_tokens {
                fit = Some(fit.map_or(len, |f| f.max(len)));
                if tokens >= fill_floor {
                    break;
                }
            } else {
                over = Some(over.map_or(len, |o| o.min(len)));
            }

            let scaled = (len as f64 * max_tokens as f64 / tokens.max(1) as f64) as usize;
            let mut next = floor_char_boundary(text, scaled.min(text.len()));
            if next == len {
                next = if tokens > max_tokens {
                    floor_char_boundary(text, len.saturating_sub(1))
                } else {
                    ceil_char_boundary(text, len + 1)
                };
            }
            if next == 0 || next == len || next == text.len() {
                break;
            }
            len = next;
        }

        let len = match fit {
            Some(len) => len,
            None => self.max_prefix_within(text, max_tokens, 0, over.unwrap_or(text.len())),
        };

        let Some(cut) = snap_to_separator(&text[..len], separators) else {
            return &text[..len];
        };
        if cut == len {
            return &text[..len];
        }

        // Snapping can merge characters into different tokens; re-measure.
        if self.count(&text[..cut]) <= max_tokens {
            return &text[..cut];
        }

        log::debug!("separator snap exceeded {max_tokens} tokens; using exact prefix search");
        let exact = self.max_prefix_within(text, max_tokens, 0, over.unwrap_or(text.len()));
        &text[..exact]
    }

    /// Suffix of `text` holding at most `overlap_tokens` tokens.
    pub fn extract_overlap<'a>(&self, text: &'a str, overlap_tokens: usize) -> &'a str {
        if overlap_tokens == 0 || text.is_empty() {
            return "";
        }

        if let Some(tokenizer) = &self.tokenizer {
            match self.token_suffix(tokenizer.as_ref(), text, overlap_tokens) {
                Ok(Some(suffix)) => return suffix,
                Ok(None) => {
                    log::debug!("token suffix did not round-trip; falling back to word boundary");
                }
                Err(e) => self.note_fallback(&e),
            }
        }

        self.word_suffix(text, overlap_tokens)
    }

    fn token_suffix<'a>(
        &self,
        tokenizer: &dyn Tokenizer,
        text: &'a str,
        overlap_tokens: usize,
    ) -> crate::Result<Option<&'a str>> {
        let ids = tokenizer.encode(text)?;
        if ids.len() <= overlap_tokens {
            return Ok(Some(text));
        }

        let decoded = tokenizer.decode(&ids[ids.len() - overlap_tokens..])?;
        if decoded.is_empty() || !text.ends_with(decoded.as_str()) {
            return Ok(None);
        }

        let suffix = &text[text.len() - decoded.len()..];
        if self.count(suffix) > overlap_tokens {
            return Ok(None);
        }
        Ok(Some(suffix))
    }

    fn word_suffix<'a>(&self, text: &'a str, overlap_tokens: usize) -> &'a str {
        let mut start = text.len();
        let mut exhausted = true;

        let word_starts = text
            .char_indices()
            .rev()
            .filter(|(_, ch)| ch.is_whitespace())
            .map(|(idx, ch)| idx + ch.len_utf8());

        for candidate in word_starts {
            if candidate >= start {
                continue;
            }
            if self.count(&text[candidate..]) <= overlap_tokens {
                start = candidate;
            } else {
                exhausted = false;
                break;
            }
        }

        if exhausted && self.count(text) <= overlap_tokens {
            start = 0;
        }

        &text[start..]
    }

    /// Binary search for the longest prefix in `(lo, hi]` whose count fits.
    fn max_prefix_within(&self, text: &str, max_tokens: usize, lo: usize, hi: usize) -> usize {
        let mut lo = lo;
        let mut hi = hi.min(text.len());

        while lo < hi {
            let mid = ceil_char_boundary(text, lo + (hi - lo).div_ceil(2));
            let mid = if mid > hi { hi } else { mid };
            if self.count(&text[..mid]) <= max_tokens {
                lo = mid;
            } else {
                let below = floor_char_boundary(text, mid - 1);
                if below <= lo {
                    break;
                }
                hi = below;
            }
        }

        if lo == 0 {
            first_char_len(text)
        } else {
            lo
        }
    }

    fn note_fallback(&self, err: &ChunkerError) {
        if !self.fallback_logged.swap(true, Ordering::Relaxed) {
            log::warn!("tokenizer unavailable, using ~{CHARS_PER_TOKEN} chars/token estimate: {err}");
        }
    }
}

/// Cut point inside the trailing part of `window`: the rightmost separator
/// occurrence wins, the longest separator breaks ties at equal ends.
fn snap_to_separator(window: &str, separators: &[String]) -> Option<usize> {
    let tail_len = (window.len() as f64 * SNAP_SEARCH_FRACTION) as usize;
    let search_start = floor_char_boundary(window, window.len() - tail_len);
    let region = &window[search_start..];

    let mut best: Option<(usize, usize)> = None;
    for sep in separators {
        if let Some(pos) = region.rfind(sep.as_str()) {
            let end = search_start + pos + sep.len();
            let better = match best {
                None => true,
                Some((best_end, best_len)) => {
                    end > best_end || (end == best_end && sep.len() > best_len)
                }
            };
            if better {
                best = Some((end, sep.len()));
            }
        }
    }

    best.map(|(end, _)| end).filter(|&end| end > 0)
}

fn first_char_len(text: &str) -> usize {
    text.chars().next().map_or(0, char::len_utf8)
}
