use rand::{Rng, RngCore};

use fuzzilu_ir::builder::{BuildMode, GeneratorTable, ProgramBuilder, ProgramSource};
use fuzzilu_ir::{Environment, Program};

use crate::{finalize_if_valid, Mutator};

/// Lower/upper bound on how many build steps `CodeGenMutator` spends at
/// its chosen insertion point.
const MIN_BUDGET: u32 = 1;
const MAX_BUDGET: u32 = 5;

/// Appends freshly generated code at a random position in the parent,
/// using the same weighted [`GeneratorTable`] the builder draws from
/// when growing a program from scratch.
pub struct CodeGenMutator {
    generators: GeneratorTable,
}

impl CodeGenMutator {
    pub fn new(generators: GeneratorTable) -> Self {
        CodeGenMutator { generators }
    }

    pub fn with_default_generators() -> Self {
        Self::new(GeneratorTable::lua_default())
    }
}

impl Mutator for CodeGenMutator {
    fn name(&self) -> &'static str {
        "CodeGenMutator"
    }

    fn mutate(
        &self,
        rng: &mut dyn RngCore,
        environment: &Environment,
        parent: &Program,
        _corpus: &dyn ProgramSource,
    ) -> Option<Program> {
        let code = parent.code();
        let split = rng.gen_range(0..=code.len());
        let budget = rng.gen_range(MIN_BUDGET..=MAX_BUDGET);

        let mut builder = ProgramBuilder::with_parent(environment, parent.id());
        for instr in code.as_slice()[..split].iter().cloned() {
            builder.replay_instruction(instr);
        }

        builder.build(budget, BuildMode::Generating, &self.generators, None);

        for instr in code.as_slice()[split..].iter().cloned() {
            builder.replay_instruction(instr);
        }

        finalize_if_valid(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct EmptyCorpus;
    impl ProgramSource for EmptyCorpus {
        fn random_program(&self) -> Option<&Program> {
            None
        }
    }

    fn one_instruction_program(environment: &Environment) -> Program {
        let mut builder = ProgramBuilder::new(environment);
        builder.load_integer(42);
        builder.finalize()
    }

    #[test]
    fn appends_generated_instructions() {
        let environment = Environment::lua_stdlib();
        let parent = one_instruction_program(&environment);
        let mutator = CodeGenMutator::with_default_generators();
        let mut rng = SmallRng::seed_from_u64(13);
        let mut grew = false;
        for _ in 0..20 {
            if let Some(child) = mutator.mutate(&mut rng, &environment, &parent, &EmptyCorpus) {
                if child.code().len() > parent.code().len() {
                    grew = true;
                    break;
                }
            }
        }
        assert!(grew, "expected generated code to append at least one instruction across retries");
    }
}
