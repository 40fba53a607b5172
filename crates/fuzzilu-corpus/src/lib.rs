//! Bounded corpus store (§4.10): a mapping from program id to
//! `(Program, remainingMutationBudget, insertionOrder)`, weighted
//! sampling for splicing and mutation, capacity-bound eviction, and
//! on-disk persistence of the `.fzil` format `fuzzilu_ir::serialize`
//! defines.
//!
//! Entries enter with a full mutation budget and lose one unit each
//! time the fuzz loop picks them for mutation
//! ([`Corpus::record_mutation`]); once a sample's budget hits zero it is
//! the first kind of entry [`Corpus::add`] evicts when the corpus grows
//! past its configured maximum.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use rand::Rng;
use thiserror::Error;

use fuzzilu_ir::builder::ProgramSource;
use fuzzilu_ir::limits::DEFAULT_CORPUS_MUTATION_BUDGET;
use fuzzilu_ir::{deserialize_program, serialize_program, Program, ProgramId, SerializeError};

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corpus entry failed to deserialize: {0}")]
    Serialize(#[from] SerializeError),
}

type Result<T> = std::result::Result<T, CorpusError>;

struct Entry {
    program: Program,
    remaining_budget: u32,
    insertion_order: u64,
}

/// The bounded, budget-weighted program store every fuzzer instance
/// owns. Never shared between fuzzer instances (§5's "each worker has
/// its own corpus") — exported interesting programs cross that
/// boundary as serialized bytes, not as a shared `Corpus`.
pub struct Corpus {
    entries: AHashMap<ProgramId, Entry>,
    min_size: usize,
    max_size: usize,
    default_budget: u32,
    next_insertion_order: u64,
    exported: AHashMap<ProgramId, ()>,
}

impl Corpus {
    /// `min_size`/`max_size` form the capacity window of §4.10: below
    /// `min_size` the caller (the fuzz loop's bootstrap phase) should
    /// keep generating seeds rather than start mutating; above
    /// `max_size`, [`Corpus::add`] evicts.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Corpus {
            entries: AHashMap::new(),
            min_size,
            max_size,
            default_budget: DEFAULT_CORPUS_MUTATION_BUDGET,
            next_insertion_order: 0,
            exported: AHashMap::new(),
        }
    }

    pub fn with_mutation_budget(min_size: usize, max_size: usize, default_budget: u32) -> Self {
        Corpus {
            default_budget,
            ..Self::new(min_size, max_size)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// True while the corpus hasn't yet reached its configured minimum
    /// — the bootstrap phase's "keep generating seeds" condition.
    pub fn is_below_min_size(&self) -> bool {
        self.entries.len() < self.min_size
    }

    pub fn get(&self, id: ProgramId) -> Option<&Program> {
        self.entries.get(&id).map(|entry| &entry.program)
    }

    pub fn remaining_budget(&self, id: ProgramId) -> Option<u32> {
        self.entries.get(&id).map(|entry| entry.remaining_budget)
    }

    /// Inserts a freshly produced or imported program with a full
    /// mutation budget, then evicts down to `max_size` if this pushed
    /// the corpus over it.
    pub fn add(&mut self, program: Program) -> ProgramId {
        let id = program.id();
        let insertion_order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.entries.insert(
            id,
            Entry {
                program,
                remaining_budget: self.default_budget,
                insertion_order,
            },
        );
        self.evict_if_needed();
        id
    }

    /// Spends one unit of `id`'s mutation budget. Called once per
    /// mutation attempt regardless of whether the mutation produced an
    /// interesting child — the budget bounds how many times a sample is
    /// *tried*, not how many times it succeeds.
    pub fn record_mutation(&mut self, id: ProgramId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.remaining_budget = entry.remaining_budget.saturating_sub(1);
        }
    }

    /// While over `max_size`, removes the entry with the lowest
    /// `(has_remaining_budget, insertion_order)` key — exhausted-budget
    /// entries go first, ties broken by oldest insertion.
    fn evict_if_needed(&mut self) {
        while self.entries.len() > self.max_size {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.remaining_budget > 0, entry.insertion_order))
                .map(|(&id, _)| id);
            match victim {
                Some(id) => {
                    self.entries.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Weight combining remaining budget and recency (§4.10): samples
    /// with budget left and samples inserted more recently are both
    /// favored, neither to the exclusion of the other.
    fn weight(&self, entry: &Entry) -> f64 {
        let budget_factor = 1.0 + entry.remaining_budget as f64;
        let span = self.next_insertion_order.max(1) as f64;
        let recency_factor = 1.0 + entry.insertion_order as f64 / span;
        budget_factor * recency_factor
    }

    fn weighted_pick(&self) -> Option<ProgramId> {
        if self.entries.is_empty() {
            return None;
        }
        let weighted: Vec<(ProgramId, f64)> = self
            .entries
            .iter()
            .map(|(&id, entry)| (id, self.weight(entry)))
            .collect();
        let total: f64 = weighted.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return weighted.first().map(|(id, _)| *id);
        }
        let mut choice = rand::thread_rng().gen_range(0.0..total);
        for (id, weight) in &weighted {
            if choice < *weight {
                return Some(*id);
            }
            choice -= weight;
        }
        weighted.last().map(|(id, _)| *id)
    }

    /// `randomElementForSplicing` (§4.10): the donor a splice mutator
    /// grafts a fragment from.
    pub fn random_element_for_splicing(&self) -> Option<&Program> {
        self.weighted_pick().and_then(|id| self.get(id))
    }

    /// `randomElementForMutating` (§4.10): the sample a single mutation
    /// round is applied to. Returns the id so the caller can pair the
    /// pick with [`Corpus::record_mutation`].
    pub fn random_element_for_mutating(&self) -> Option<ProgramId> {
        self.weighted_pick()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Program> {
        self.entries.values().map(|entry| &entry.program)
    }

    /// Reads every `*.fzil` file in `dir` and adds it to the corpus
    /// (`--resume`, §6). Files that fail to parse are logged and
    /// skipped rather than aborting the whole import.
    pub fn import_from(&mut self, dir: &Path) -> Result<usize> {
        let mut imported = 0;
        if !dir.exists() {
            return Ok(0);
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("fzil") {
                continue;
            }
            let bytes = fs::read(&path)?;
            match deserialize_program(&bytes) {
                Ok(program) => {
                    let id = program.id();
                    self.add(program);
                    self.exported.insert(id, ());
                    imported += 1;
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable corpus entry");
                }
            }
        }
        Ok(imported)
    }

    /// Writes every entry not yet written by a previous call to
    /// `dir/<id>.fzil` (the continuous-export contract of §6). Returns
    /// the number of files newly written.
    pub fn export_new_to(&mut self, dir: &Path) -> Result<usize> {
        fs::create_dir_all(dir)?;
        let pending: Vec<ProgramId> = self
            .entries
            .keys()
            .copied()
            .filter(|id| !self.exported.contains_key(id))
            .collect();
        for id in &pending {
            let program = &self.entries.get(id).expect("pending id just collected from entries").program;
            let bytes = serialize_program(program);
            let path = dir.join(format!("{id}.fzil"));
            fs::write(path, bytes)?;
            self.exported.insert(*id, ());
        }
        Ok(pending.len())
    }
}

impl ProgramSource for Corpus {
    fn random_program(&self) -> Option<&Program> {
        self.random_element_for_splicing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzilu_ir::builder::ProgramBuilder;
    use fuzzilu_ir::Environment;

    fn sample_program(environment: &Environment, value: i64) -> Program {
        let mut builder = ProgramBuilder::new(environment);
        builder.load_integer(value);
        builder.finalize()
    }

    #[test]
    fn add_and_splice_pick_round_trip() {
        let environment = Environment::lua_stdlib();
        let mut corpus = Corpus::new(0, 10);
        corpus.add(sample_program(&environment, 1));
        corpus.add(sample_program(&environment, 2));
        assert_eq!(corpus.len(), 2);
        assert!(corpus.random_element_for_splicing().is_some());
    }

    #[test]
    fn eviction_prefers_exhausted_budget_entries() {
        let environment = Environment::lua_stdlib();
        let mut corpus = Corpus::with_mutation_budget(0, 2, 1);
        let exhausted = corpus.add(sample_program(&environment, 10));
        corpus.record_mutation(exhausted);
        assert_eq!(corpus.remaining_budget(exhausted), Some(0));

        corpus.add(sample_program(&environment, 20));
        assert_eq!(corpus.len(), 2);

        corpus.add(sample_program(&environment, 30));
        assert_eq!(corpus.len(), 2);
        assert!(corpus.get(exhausted).is_none(), "the exhausted-budget entry should be evicted first");
    }

    #[test]
    fn below_min_size_until_populated() {
        let environment = Environment::lua_stdlib();
        let mut corpus = Corpus::new(2, 10);
        assert!(corpus.is_below_min_size());
        corpus.add(sample_program(&environment, 1));
        assert!(corpus.is_below_min_size());
        corpus.add(sample_program(&environment, 2));
        assert!(!corpus.is_below_min_size());
    }

    #[test]
    fn export_then_import_round_trips_programs() {
        let environment = Environment::lua_stdlib();
        let dir = tempfile::tempdir().unwrap();

        let mut exporter = Corpus::new(0, 10);
        exporter.add(sample_program(&environment, 42));
        exporter.add(sample_program(&environment, 43));
        let written = exporter.export_new_to(dir.path()).unwrap();
        assert_eq!(written, 2);

        // a second export with nothing new to write is a no-op
        assert_eq!(exporter.export_new_to(dir.path()).unwrap(), 0);

        let mut importer = Corpus::new(0, 10);
        let imported = importer.import_from(dir.path()).unwrap();
        assert_eq!(imported, 2);
        assert_eq!(importer.len(), 2);
    }

    #[test]
    fn import_from_missing_directory_is_a_no_op() {
        let mut corpus = Corpus::new(0, 10);
        assert_eq!(corpus.import_from(Path::new("/nonexistent/fuzzilu-corpus-test-dir")).unwrap(), 0);
    }
}
