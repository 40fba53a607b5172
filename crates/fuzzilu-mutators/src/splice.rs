use rand::{Rng, RngCore};

use fuzzilu_ir::builder::{ProgramBuilder, ProgramSource};
use fuzzilu_ir::{Environment, Program};

use crate::{finalize_if_valid, Mutator};

/// Splices a random program from the corpus into the parent at a
/// random position, via `fuzzilu_ir::splicer::splice`'s five-pass
/// slice-and-remap algorithm.
pub struct SpliceMutator;

impl Mutator for SpliceMutator {
    fn name(&self) -> &'static str {
        "SpliceMutator"
    }

    fn mutate(
        &self,
        rng: &mut dyn RngCore,
        environment: &Environment,
        parent: &Program,
        corpus: &dyn ProgramSource,
    ) -> Option<Program> {
        let donor = corpus.random_program()?;
        let code = parent.code();
        let split = rng.gen_range(0..=code.len());

        let mut builder = ProgramBuilder::with_parent(environment, parent.id());
        for instr in code.as_slice()[..split].iter().cloned() {
            builder.replay_instruction(instr);
        }

        if !fuzzilu_ir::splicer::splice(&mut builder, donor, None) {
            return None;
        }

        for instr in code.as_slice()[split..].iter().cloned() {
            builder.replay_instruction(instr);
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
    use std::cell::RefCell;

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
        let a = builder.load_integer(10);
        let b = builder.load_integer(20);
        let output = builder.allocate();
        builder.emit(Instruction::new(Operation::Binary(BinaryOperator::Add), Inouts::new(vec![a, b], vec![output], vec![])));
        builder.finalize()
    }

    #[test]
    fn returns_none_without_a_donor() {
        let environment = Environment::lua_stdlib();
        let parent = simple_program(&environment);
        let mut rng = SmallRng::seed_from_u64(5);
        assert!(SpliceMutator.mutate(&mut rng, &environment, &parent, &NoDonor).is_none());
    }

    #[test]
    fn splicing_a_donor_extends_the_parent() {
        let environment = Environment::lua_stdlib();
        let parent = simple_program(&environment);
        let donor = simple_program(&environment);
        let source = SingleDonor(donor);
        let rng_cell = RefCell::new(SmallRng::seed_from_u64(9));
        let mut grew = false;
        for _ in 0..20 {
            let mut rng = rng_cell.borrow_mut();
            if let Some(child) = SpliceMutator.mutate(&mut *rng, &environment, &parent, &source) {
                if child.code().len() > parent.code().len() {
                    grew = true;
                    break;
                }
            }
        }
        assert!(grew, "expected at least one splice to add instructions across retries");
    }
}
