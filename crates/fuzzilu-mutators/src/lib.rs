//! The six mutators that turn one parent [`Program`] into a child during
//! corpus evolution (§4.9): [`OperationMutator`], [`InputMutator`],
//! [`SpliceMutator`], [`CodeGenMutator`], [`ConcatMutator`] (also
//! exported as [`CombineMutator`]), and [`JitStressMutator`].
//!
//! Every mutator follows the same shape: rebuild a fresh
//! [`ProgramBuilder`] rooted at the parent, replay the parent's
//! instructions verbatim up to some chosen point via
//! [`ProgramBuilder::replay_instruction`], do whatever local surgery the
//! mutator is named for, replay the remaining instructions, and finally
//! run [`Validator::validate`] over the result — a mutation that leaves
//! the program statically invalid is simply discarded (`None`), never
//! patched up. None of this needs a corpus-aware retry loop: the fuzz
//! loop just asks for another mutation if one comes back empty.

mod codegen;
mod combine;
mod input;
mod jit_stress;
mod operation;
mod splice;

pub use codegen::CodeGenMutator;
pub use input::InputMutator;
pub use jit_stress::JitStressMutator;
pub use operation::OperationMutator;
pub use splice::SpliceMutator;

/// `ConcatMutator` and `CombineMutator` name the same joining-two-
/// programs operation in spec.md §4.9; implemented once as
/// [`combine::ConcatMutator`] and exported under both names.
pub use combine::ConcatMutator;
pub use combine::ConcatMutator as CombineMutator;

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use fuzzilu_ir::builder::ProgramSource;
use fuzzilu_ir::{Environment, Program, Validator};

/// Produces a child program from a parent, or `None` if this mutator
/// had nothing to do (no eligible site) or its result failed
/// validation. Mirrors `fuzzilu_ir::builder::CodeGenerator` in spirit:
/// a small trait object the fuzz loop picks from a weighted table
/// rather than a closed enum, so new mutators can be added without
/// touching the loop that drives them.
pub trait Mutator {
    fn name(&self) -> &'static str;

    fn mutate(
        &self,
        rng: &mut dyn RngCore,
        environment: &Environment,
        parent: &Program,
        corpus: &dyn ProgramSource,
    ) -> Option<Program>;
}

/// Finishes a builder started by a mutator: finalizes it into a
/// `Program` and discards it unless the result still passes static
/// validation (spec.md §4.9's "preserve static validity" rule).
fn finalize_if_valid(builder: fuzzilu_ir::builder::ProgramBuilder<'_>) -> Option<Program> {
    let child = builder.finalize();
    match Validator::validate(child.code()) {
        Ok(()) => Some(child),
        Err(error) => {
            tracing::trace!(%error, "mutation produced invalid code, discarding");
            None
        }
    }
}

/// A weighted pool of mutators, mirroring `fuzzilu_ir::builder::GeneratorTable`'s
/// shape: the fuzz loop asks for one mutator at a time rather than
/// hard-coding a cycle through all six.
pub struct MutatorTable {
    entries: Vec<(Box<dyn Mutator>, u32)>,
}

impl MutatorTable {
    pub fn new() -> Self {
        MutatorTable { entries: Vec::new() }
    }

    pub fn register(&mut self, mutator: impl Mutator + 'static, weight: u32) {
        self.entries.push((Box::new(mutator), weight));
    }

    /// Randomizes every weight in place — `--swarmTesting` applies this
    /// at startup the same way it does to the code generator table.
    pub fn randomize_weights(&mut self) {
        let mut rng = rand::thread_rng();
        for (_, weight) in &mut self.entries {
            *weight = rng.gen_range(1..=10);
        }
    }

    pub fn pick(&self) -> Option<&dyn Mutator> {
        let total: u32 = self.entries.iter().map(|(_, w)| *w).sum();
        if self.entries.is_empty() {
            return None;
        }
        if total == 0 {
            return self.entries.choose(&mut rand::thread_rng()).map(|(m, _)| m.as_ref());
        }
        let mut choice = rand::thread_rng().gen_range(0..total);
        for (mutator, weight) in &self.entries {
            if choice < *weight {
                return Some(mutator.as_ref());
            }
            choice -= weight;
        }
        self.entries.last().map(|(m, _)| m.as_ref())
    }

    /// The default pool and relative weights used by the fuzz loop:
    /// splicing and code generation run most often since they are the
    /// main sources of genuinely new behavior, the JIT stress mutator
    /// least often since it only ever wraps existing code.
    pub fn lua_default(generators: fuzzilu_ir::builder::GeneratorTable) -> Self {
        let mut table = MutatorTable::new();
        table.register(OperationMutator, 8);
        table.register(InputMutator, 8);
        table.register(SpliceMutator, 12);
        table.register(CodeGenMutator::new(generators), 12);
        table.register(ConcatMutator, 4);
        table.register(JitStressMutator, 2);
        table
    }
}

impl Default for MutatorTable {
    fn default() -> Self {
        Self::new()
    }
}
