//! Greedy packing of semantic units into draft chunks.

use crate::token_counter::TokenCounter;
use crate::types::{join_content, DraftChunk, SemanticUnit};

/// Packs units (or drafts) left to right under the token budget
pub(crate) struct ChunkAssembler<'a> {
    counter: &'a TokenCounter,
    max_units: usize,
}

impl<'a> ChunkAssembler<'a> {
    pub const fn new(counter: &'a TokenCounter, max_units: usize) -> Self {
        Self { counter, max_units }
    }

    /// Pack the outermost units of `source`.
    ///
    /// Top-level code outside every unit is not emitted.
    pub fn assemble(&self, source: &str, units: &[SemanticUnit]) -> Vec<DraftChunk> {
        let planned = plan_outermost(units);
        let skipped = uncovered_code_bytes(source, &planned);
        if skipped > 0 {
            log::debug!("{skipped} bytes of top-level code lie outside every unit");
        }

        let drafts = planned.into_iter().map(DraftChunk::from_unit).collect();
        self.pack(drafts)
    }

    /// Greedy merge pass.
    ///
    /// Atomic drafts and cascade parts are emitted alone. Otherwise the next
    /// draft joins the accumulator when the joined text fits `max_tokens`,
    /// either side is under `min_tokens`, and the accumulator has room for
    /// another unit.
    pub fn pack(&self, drafts: Vec<DraftChunk>) -> Vec<DraftChunk> {
        let mut out = Vec::with_capacity(drafts.len());
        let mut acc: Option<DraftChunk> = None;

        for draft in drafts {
            if draft.atomic || draft.split.is_some() {
                out.extend(acc.take());
                out.push(draft);
                continue;
            }

            acc = match acc.take() {
                Some(mut current) if self.should_merge(&current, &draft) => {
                    current.absorb(draft);
                    Some(current)
                }
                Some(current) => {
                    out.push(current);
                    Some(draft)
                }
                None => Some(draft),
            };
        }

        out.extend(acc);
        out
    }

    fn should_merge(&self, acc: &DraftChunk, next: &DraftChunk) -> bool {
        if acc.unit_count() >= self.max_units {
            return false;
        }

        let min = self.counter.min_tokens();
        let small = self.counter.count(&acc.content) < min || self.counter.count(&next.content) < min;
        small && self.counter.count(&join_content(&acc.content, &next.content)) <= self.counter.max_tokens()
    }
}

/// Units not nested inside another unit, in source order
pub(crate) fn plan_outermost(units: &[SemanticUnit]) -> Vec<&SemanticUnit> {
    let mut out: Vec<&SemanticUnit> = Vec::with_capacity(units.len());
    for unit in units {
        let nested = out
            .last()
            .is_some_and(|outer| unit.byte_range.start < outer.byte_range.end);
        if !nested {
            out.push(unit);
        }
    }
    out
}

/// Non-whitespace bytes of `source` outside the planned unit ranges
pub(crate) fn uncovered_code_bytes(source: &str, planned: &[&SemanticUnit]) -> usize {
    let bytes = source.as_bytes();
    let tally = |gap: &[u8]| gap.iter().filter(|b| !b.is_ascii_whitespace()).count();
    let mut cursor = 0;
    let mut skipped = 0;

    for unit in planned {
        let start = unit.byte_range.start.min(bytes.len());
        if start > cursor {
            skipped += tally(&bytes[cursor..start]);
        }
        cursor = cursor.max(unit.byte_range.end.min(bytes.len()));
    }
    skipped + tally(&bytes[cursor..])
}

/// Cut `source` into segments, one per innermost unit.
///
/// A segment runs from the end of the previous one to the end of its unit;
/// the last one runs to the end of the text. Concatenating the segments gives
/// back `source` exactly, so header and trailer text of containers is kept.
pub(crate) fn plan_finest(source: &str, units: &[SemanticUnit]) -> Vec<DraftChunk> {
    let leaves: Vec<&SemanticUnit> = units
        .iter()
        .filter(|unit| !units.iter().any(|other| unit.contains(other)))
        .collect();

    let mut segments = Vec::with_capacity(leaves.len());
    let mut cursor = 0;

    for (idx, leaf) in leaves.iter().enumerate() {
        let end = if idx + 1 == leaves.len() {
            source.len()
        } else {
            leaf.byte_range.end.max(cursor)
        };
        if end <= cursor {
            continue;
        }

        let mut segment = DraftChunk::from_unit(leaf);
        segment.content = source[cursor..end].to_string();
        segments.push(segment);
        cursor = end;
    }

    if cursor < source.len() {
        if let Some(last) = segments.last_mut() {
            last.content.push_str(&source[cursor..]);
        }
    }

    segments
}
