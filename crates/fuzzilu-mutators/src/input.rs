use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use fuzzilu_ir::builder::{ProgramBuilder, ProgramSource};
use fuzzilu_ir::{Environment, Inouts, Instruction, Program};

use crate::{finalize_if_valid, Mutator};

/// Probability a replacement is drawn from variables whose static type
/// already matches the one being replaced, rather than uniformly from
/// everything visible.
const TYPE_AWARE_PROBABILITY: f64 = 0.70;

/// Replaces one input of a randomly chosen instruction with another
/// variable visible at that point, biased toward a type-compatible
/// replacement so the mutation stays plausible more often than not.
pub struct InputMutator;

impl Mutator for InputMutator {
    fn name(&self) -> &'static str {
        "InputMutator"
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
            .filter(|(_, instr)| !instr.inputs().is_empty())
            .map(|(pc, _)| pc)
            .collect();
        let &target = candidates.choose(rng)?;

        let mut builder = ProgramBuilder::with_parent(environment, parent.id());
        for instr in code.as_slice()[..target].iter().cloned() {
            builder.replay_instruction(instr);
        }

        let original = code.get(target).expect("target index in range").clone();
        let slot = rng.gen_range(0..original.inputs().len());
        let replaced = original.inputs()[slot];

        let replacement = pick_replacement(rng, &builder, replaced)?;
        if replacement == replaced {
            return None;
        }

        let mut inputs = original.inputs().to_vec();
        inputs[slot] = replacement;
        let inouts = Inouts::new(inputs, original.outputs().to_vec(), original.inner_outputs().to_vec());
        builder.replay_instruction(Instruction::new(original.operation().clone(), inouts));

        for instr in code.as_slice()[target + 1..].iter().cloned() {
            builder.replay_instruction(instr);
        }

        finalize_if_valid(builder)
    }
}

fn pick_replacement(
    rng: &mut dyn RngCore,
    builder: &ProgramBuilder,
    replaced: fuzzilu_ir::Variable,
) -> Option<fuzzilu_ir::Variable> {
    if rng.gen_bool(TYPE_AWARE_PROBABILITY) {
        let required = builder.type_of(replaced);
        if let Some(typed) = builder.random_variable_of_type(&required) {
            return Some(typed);
        }
    }
    builder.random_variable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzilu_ir::{Operation, Program};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct EmptyCorpus;
    impl ProgramSource for EmptyCorpus {
        fn random_program(&self) -> Option<&Program> {
            None
        }
    }

    fn three_variable_program() -> Program {
        let environment = Environment::lua_stdlib();
        let mut builder = ProgramBuilder::new(&environment);
        let a = builder.load_integer(1);
        let b = builder.load_integer(2);
        let output = builder.allocate();
        builder.emit(Instruction::new(
            Operation::Binary(fuzzilu_ir::instruction::operators::BinaryOperator::Add),
            Inouts::new(vec![a, b], vec![output], vec![]),
        ));
        builder.finalize()
    }

    #[test]
    fn sometimes_swaps_an_input() {
        let environment = Environment::lua_stdlib();
        let parent = three_variable_program();
        let mut rng = SmallRng::seed_from_u64(11);
        let mut saw_change = false;
        for _ in 0..50 {
            if let Some(child) = InputMutator.mutate(&mut rng, &environment, &parent, &EmptyCorpus) {
                let new_inputs = child.code().get(2).unwrap().inputs().to_vec();
                let old_inputs = parent.code().get(2).unwrap().inputs().to_vec();
                if new_inputs != old_inputs {
                    saw_change = true;
                    break;
                }
            }
        }
        assert!(saw_change, "expected at least one successful input swap across retries");
    }

    #[test]
    fn discards_when_nothing_has_inputs() {
        let environment = Environment::lua_stdlib();
        let mut builder = ProgramBuilder::new(&environment);
        builder.load_nil();
        let parent = builder.finalize();
        let mut rng = SmallRng::seed_from_u64(2);
        assert!(InputMutator.mutate(&mut rng, &environment, &parent, &EmptyCorpus).is_none());
    }
}
