use rand::RngCore;

use fuzzilu_ir::builder::{ProgramBuilder, ProgramSource};
use fuzzilu_ir::{Environment, Program};

use crate::{finalize_if_valid, Mutator};

/// Joins a donor program onto the parent (spec.md §4.9's
/// "ConcatMutator / CombineMutator"). Implemented as a splice rooted at
/// the donor's last instruction rather than a separate verbatim-append
/// path: in a donor with no dead code that slice is the whole program,
/// and the splicer's existing remap step already does the variable
/// renumbering a literal concatenation would otherwise need from
/// scratch.
pub struct ConcatMutator;

impl Mutator for ConcatMutator {
    fn name(&self) -> &'static str {
        "ConcatMutator"
    }

    fn mutate(
        &self,
        _rng: &mut dyn RngCore,
        environment: &Environment,
        parent: &Program,
        corpus: &dyn ProgramSource,
    ) -> Option<Program> {
        let donor = corpus.random_program()?;
        if donor.code().is_empty() {
            return None;
        }

        let mut builder = ProgramBuilder::with_parent(environment, parent.id());
        for instr in parent.code().as_slice().iter().cloned() {
            builder.replay_instruction(instr);
        }

        let root = donor.code().len() - 1;
        if !fuzzilu_ir::splicer::splice(&mut builder, donor, Some(root)) {
            return None;
        }

        finalize_if_valid(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzilu_ir::instruction::operators::BinaryOperator;
    use fuzzilu_ir::{Inouts, Instruction, Operation};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct SingleDonor(Program);
    impl ProgramSource for SingleDonor {
        fn random_program(&self) -> Option<&Program> {
            Some(&self.0)
        }
    }

    struct NoDonor;
    impl ProgramSource for NoDonor {
        fn random_program(&self) -> Option<&Program> {
            None
        }
    }

    fn simple_program(environment: &Environment) -> Program {
        let mut builder = ProgramBuilder::new(environment);
        let a = builder.load_integer(3);
        let b = builder.load_integer(4);
        let output = builder.allocate();
        builder.emit(Instruction::new(Operation::Binary(BinaryOperator::Mul), Inouts::new(vec![a, b], vec![output], vec![])));
        builder.finalize()
    }

    #[test]
    fn returns_none_without_a_donor() {
        let environment = Environment::lua_stdlib();
        let parent = simple_program(&environment);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(ConcatMutator.mutate(&mut rng, &environment, &parent, &NoDonor).is_none());
    }

    #[test]
    fn joining_a_donor_grows_the_program() {
        let environment = Environment::lua_stdlib();
        let parent = simple_program(&environment);
        let donor = simple_program(&environment);
        let source = SingleDonor(donor);
        let mut rng = SmallRng::seed_from_u64(42);
        let child = ConcatMutator.mutate(&mut rng, &environment, &parent, &source).expect("join should succeed for two flat programs");
        assert!(child.code().len() > parent.code().len());
    }
}
