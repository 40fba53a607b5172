use rand::seq::SliceRandom;
use rand::RngCore;

use fuzzilu_ir::builder::{ProgramBuilder, ProgramSource};
use fuzzilu_ir::instruction::operators::CompareOperator;
use fuzzilu_ir::{Environment, Inouts, Instruction, Operation, Program};

use crate::{finalize_if_valid, Mutator};

/// Iteration count the wrapping loop counts up to. High enough to
/// comfortably clear a native-compilation trip threshold in a typical
/// tiered Lua interpreter without the fuzz loop spending forever inside
/// one execution.
const JIT_STRESS_ITERATIONS: i64 = 10_000;

/// Wraps a single existing instruction in a counted `repeat` loop so
/// re-executing it thousands of times has a chance of pushing the
/// target interpreter's JIT past its tiering threshold. Candidates are
/// restricted to plain, non-block instructions — wrapping one in place
/// can still invalidate the program if later code depended on a
/// variable the wrapped instruction defines (that variable's scope
/// closes with the loop); such attempts are simply discarded by
/// validation like any other mutator's misfire.
pub struct JitStressMutator;

impl Mutator for JitStressMutator {
    fn name(&self) -> &'static str {
        "JITStressMutator"
    }

    fn mutate(
        &self,
        rng: &mut dyn RngCore,
        environment: &Environment,
        parent: &Program,
        _corpus: &dyn ProgramSource,
    ) -> Option<Program> {
        let code = parent.code();
        let candidates: Vec<usize> = code
            .iter_indexed()
            .filter(|(_, instr)| !instr.is_block_start() && !instr.is_block_end() && !instr.is_jump())
            .map(|(pc, _)| pc)
            .collect();
        let &target = candidates.choose(rng)?;

        let mut builder = ProgramBuilder::with_parent(environment, parent.id());
        for instr in code.as_slice()[..target].iter().cloned() {
            builder.replay_instruction(instr);
        }

        let counter = builder.allocate();
        builder.emit(Instruction::new(Operation::BeginRepeat { has_counter: true }, Inouts::new(vec![], vec![], vec![counter])));

        builder.replay_instruction(code.get(target).expect("target index in range").clone());

        let bound = builder.load_integer(JIT_STRESS_ITERATIONS);
        let done = builder.allocate();
        builder.emit(Instruction::new(
            Operation::Compare(CompareOperator::GreaterEqual),
            Inouts::new(vec![counter, bound], vec![done], vec![]),
        ));
        builder.emit(Instruction::new(Operation::EndRepeat, Inouts::new(vec![done], vec![], vec![])));

        for instr in code.as_slice()[target + 1..].iter().cloned() {
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

    #[test]
    fn wraps_a_leaf_instruction_in_a_counted_loop() {
        let environment = Environment::lua_stdlib();
        let mut builder = ProgramBuilder::new(&environment);
        builder.load_integer(7);
        let parent = builder.finalize();

        let mut rng = SmallRng::seed_from_u64(21);
        let mut wrapped = false;
        for _ in 0..20 {
            if let Some(child) = JitStressMutator.mutate(&mut rng, &environment, &parent, &EmptyCorpus) {
                let has_repeat = child
                    .code()
                    .iter()
                    .any(|instr| matches!(instr.operation(), Operation::BeginRepeat { has_counter: true }));
                if has_repeat {
                    wrapped = true;
                    break;
                }
            }
        }
        assert!(wrapped, "expected at least one successful loop-wrap across retries");
    }

    #[test]
    fn discards_when_there_is_nothing_wrappable() {
        let environment = Environment::lua_stdlib();
        let parent = ProgramBuilder::new(&environment).finalize();
        let mut rng = SmallRng::seed_from_u64(4);
        assert!(JitStressMutator.mutate(&mut rng, &environment, &parent, &EmptyCorpus).is_none());
    }
}
