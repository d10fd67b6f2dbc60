//! Post-assembly passes over draft chunks.
//!
//! Each pass checks whether it has anything to do before touching the list,
//! and running a pass twice gives the same result as running it once.

use crate::assembler::ChunkAssembler;
use crate::cascade::OversizeRecoveryCascade;
use crate::imports::{has_import_line, ImportEntry};
use crate::text::starts_declaration;
use crate::token_counter::TokenCounter;
use crate::types::{join_content, DraftChunk, UnitKind};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy)]
pub(crate) struct QualityOptimizer<'a> {
    counter: &'a TokenCounter,
    assembler: &'a ChunkAssembler<'a>,
    cascade: &'a OversizeRecoveryCascade<'a>,
    dedupe: bool,
    restore_imports: bool,
}

impl<'a> QualityOptimizer<'a> {
    pub const fn new(
        counter: &'a TokenCounter,
        assembler: &'a ChunkAssembler<'a>,
        cascade: &'a OversizeRecoveryCascade<'a>,
    ) -> Self {
        Self {
            counter,
            assembler,
            cascade,
            dedupe: true,
            restore_imports: true,
        }
    }

    #[must_use]
    pub const fn dedupe(mut self, enabled: bool) -> Self {
        self.dedupe = enabled;
        self
    }

    #[must_use]
    pub const fn restore_imports(mut self, enabled: bool) -> Self {
        self.restore_imports = enabled;
        self
    }

    /// Run every pass in order
    pub fn optimize(&self, drafts: Vec<DraftChunk>, imports: &[ImportEntry]) -> Vec<DraftChunk> {
        let drafts = self.merge_small(drafts);
        let drafts = self.split_large(drafts);
        let drafts = self.dedupe_chunks(drafts);
        self.restore(drafts, imports)
    }

    fn is_small(&self, draft: &DraftChunk) -> bool {
        !draft.atomic && self.counter.count(&draft.content) < self.counter.min_tokens()
    }

    fn is_large(&self, draft: &DraftChunk) -> bool {
        !draft.atomic && self.counter.count(&draft.content) > self.counter.max_tokens()
    }

    pub fn merge_small(&self, drafts: Vec<DraftChunk>) -> Vec<DraftChunk> {
        if drafts.len() < 2 || !drafts.iter().any(|draft| self.is_small(draft)) {
            return drafts;
        }
        self.assembler.pack(drafts)
    }

    pub fn split_large(&self, drafts: Vec<DraftChunk>) -> Vec<DraftChunk> {
        if !drafts.iter().any(|draft| self.is_large(draft)) {
            return drafts;
        }

        let mut out = Vec::with_capacity(drafts.len() + 4);
        for draft in drafts {
            if self.is_large(&draft) {
                out.extend(self.cascade.split(draft));
            } else {
                out.push(draft);
            }
        }
        out
    }

    /// Drop chunks whose trimmed text repeats an earlier chunk.
    ///
    /// Surviving members of a split group are renumbered so `split` keeps
    /// describing the emitted parts.
    pub fn dedupe_chunks(&self, drafts: Vec<DraftChunk>) -> Vec<DraftChunk> {
        if !self.dedupe || drafts.len() < 2 {
            return drafts;
        }

        let mut seen: HashSet<[u8; 32]> = HashSet::with_capacity(drafts.len());
        let before = drafts.len();
        let mut group = 0;
        let kept: Vec<(Option<usize>, DraftChunk)> = drafts
            .into_iter()
            .map(|draft| {
                let id = match draft.split {
                    Some((1, _)) => {
                        group += 1;
                        Some(group)
                    }
                    Some(_) => Some(group),
                    None => None,
                };
                (id, draft)
            })
            .filter(|(_, draft)| {
                let digest: [u8; 32] = Sha256::digest(draft.content.trim().as_bytes()).into();
                seen.insert(digest)
            })
            .collect();

        if kept.len() == before {
            return kept.into_iter().map(|(_, draft)| draft).collect();
        }
        log::debug!("dropped {} duplicate chunks", before - kept.len());
        renumber_split_groups(kept)
    }

    /// Prepend the imports a declaration chunk references but does not carry.
    pub fn restore(&self, mut drafts: Vec<DraftChunk>, imports: &[ImportEntry]) -> Vec<DraftChunk> {
        if !self.restore_imports || imports.is_empty() {
            return drafts;
        }

        for draft in &mut drafts {
            if draft.atomic || has_import_line(&draft.content) || !is_declaration_chunk(draft) {
                continue;
            }

            let mut header = String::new();
            let mut injected = 0;
            for entry in imports {
                if !entry.is_referenced_by(&draft.content) || draft.content.contains(entry.text.as_str()) {
                    continue;
                }

                let candidate = join_content(&header, &entry.text);
                if self.counter.count(&join_content(&candidate, &draft.content)) > self.counter.max_tokens() {
                    continue;
                }
                header = candidate;
                injected += 1;
            }

            if injected > 0 {
                draft.content = join_content(&header, &draft.content);
                draft.injected_imports += injected;
            }
        }

        drafts
    }
}

/// Declarations come from unit provenance; windows without units fall back
/// to an unindented declaration keyword.
fn is_declaration_chunk(draft: &DraftChunk) -> bool {
    if draft.units.is_empty() {
        return draft.content.lines().any(starts_declaration);
    }
    draft
        .units
        .iter()
        .any(|unit| unit.kind != UnitKind::CallExpressionMatch)
}

fn renumber_split_groups(tagged: Vec<(Option<usize>, DraftChunk)>) -> Vec<DraftChunk> {
    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for id in tagged.iter().filter_map(|(id, _)| *id) {
        *sizes.entry(id).or_default() += 1;
    }

    let mut positions: HashMap<usize, usize> = HashMap::new();
    tagged
        .into_iter()
        .map(|(id, mut draft)| {
            if let Some(id) = id {
                let total = sizes.get(&id).copied().unwrap_or(1);
                let part = positions.entry(id).or_default();
                *part += 1;
                draft.split = (total > 1).then_some((*part, total));
            }
            draft
        })
        .collect()
}
