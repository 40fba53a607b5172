use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use smol_str::SmolStr;

use fuzzilu_ir::builder::{ProgramBuilder, ProgramSource};
use fuzzilu_ir::instruction::operators::{BinaryOperator, CompareOperator, UnaryOperator};
use fuzzilu_ir::{Environment, Inouts, Instruction, Operation, Program};

use crate::{finalize_if_valid, Mutator};

const MIN_VARIADIC_EXTRA: usize = 1;
const MAX_VARIADIC_EXTRA: usize = 3;
const LITERAL_NAMES: [&str; 8] = ["x", "y", "value", "data", "key", "length", "size", "next"];

/// Substitutes the operation of a mutable or variadic instruction in
/// place — a new operator, a flipped `if`, a new method name, or (for a
/// variadic op) one to three freshly drawn trailing inputs.
pub struct OperationMutator;

impl Mutator for OperationMutator {
    fn name(&self) -> &'static str {
        "OperationMutator"
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
            .filter(|(_, instr)| is_substitutable(instr.operation()) || instr.is_variadic())
            .map(|(pc, _)| pc)
            .collect();
        let &target = candidates.choose(rng)?;

        let mut builder = ProgramBuilder::with_parent(environment, parent.id());
        for instr in code.as_slice()[..target].iter().cloned() {
            builder.replay_instruction(instr);
        }

        let original = code.get(target).expect("target index in range").clone();
        let mutated = mutate_instruction(rng, &builder, &original)?;
        builder.replay_instruction(mutated);

        for instr in code.as_slice()[target + 1..].iter().cloned() {
            builder.replay_instruction(instr);
        }

        finalize_if_valid(builder)
    }
}

/// Operations [`substitute_operator`] knows how to rewrite in place: a
/// different operator/name of the same kind, or a flipped `if`. Kept as
/// its own predicate rather than reusing
/// [`fuzzilu_ir::Instruction::is_mutable`], since that flag only covers
/// the arithmetic/comparison family and this mutator additionally
/// substitutes property and method names.
fn is_substitutable(op: &Operation) -> bool {
    matches!(
        op,
        Operation::Unary(_)
            | Operation::Binary(_)
            | Operation::Compare(_)
            | Operation::Update(_)
            | Operation::UpdateProperty { .. }
            | Operation::UpdateElement { .. }
            | Operation::BeginIf { .. }
            | Operation::CallMethod { .. }
            | Operation::GetProperty { .. }
            | Operation::SetProperty { .. }
            | Operation::DeleteProperty { .. }
            | Operation::TableAddProperty { .. }
    )
}

fn mutate_instruction(rng: &mut dyn RngCore, builder: &ProgramBuilder, instr: &Instruction) -> Option<Instruction> {
    let can_substitute = is_substitutable(instr.operation());
    let can_extend = instr.is_variadic();

    let extend = match (can_substitute, can_extend) {
        (true, true) => rng.gen_bool(0.5),
        (false, true) => true,
        (true, false) => false,
        (false, false) => return None,
    };

    if extend {
        extend_variadic(rng, builder, instr)
    } else {
        substitute_operator(rng, instr)
    }
}

fn extend_variadic(rng: &mut dyn RngCore, builder: &ProgramBuilder, instr: &Instruction) -> Option<Instruction> {
    let extra = rng.gen_range(MIN_VARIADIC_EXTRA..=MAX_VARIADIC_EXTRA);
    let mut inputs = instr.inputs().to_vec();
    for _ in 0..extra {
        inputs.push(builder.random_variable()?);
    }
    let inouts = Inouts::new(inputs, instr.outputs().to_vec(), instr.inner_outputs().to_vec());
    Some(Instruction::new(instr.operation().clone(), inouts))
}

fn substitute_operator(rng: &mut dyn RngCore, instr: &Instruction) -> Option<Instruction> {
    let operation = match instr.operation() {
        Operation::Unary(op) => Operation::Unary(other_unary(rng, *op)),
        Operation::Binary(op) => Operation::Binary(other_binary(rng, *op)),
        Operation::Compare(op) => Operation::Compare(other_compare(rng, *op)),
        Operation::Update(op) => Operation::Update(other_updatable_binary(rng, *op)),
        Operation::UpdateProperty { name, op } => Operation::UpdateProperty {
            name: name.clone(),
            op: other_updatable_binary(rng, *op),
        },
        Operation::UpdateElement { op } => Operation::UpdateElement {
            op: other_updatable_binary(rng, *op),
        },
        Operation::BeginIf { inverted } => Operation::BeginIf { inverted: !inverted },
        Operation::CallMethod { name, first_variadic_input } => Operation::CallMethod {
            name: random_method_name(rng, name),
            first_variadic_input: *first_variadic_input,
        },
        Operation::GetProperty { name } => Operation::GetProperty { name: random_property_name(rng, name) },
        Operation::SetProperty { name } => Operation::SetProperty { name: random_property_name(rng, name) },
        Operation::DeleteProperty { name } => Operation::DeleteProperty { name: random_property_name(rng, name) },
        Operation::TableAddProperty { name } => Operation::TableAddProperty { name: random_property_name(rng, name) },
        _ => return None,
    };
    Some(Instruction::new(operation, instr.inouts().clone()))
}

fn other_unary(rng: &mut dyn RngCore, current: UnaryOperator) -> UnaryOperator {
    pick_other(rng, &UnaryOperator::ALL, current)
}

fn other_binary(rng: &mut dyn RngCore, current: BinaryOperator) -> BinaryOperator {
    pick_other(rng, &BinaryOperator::ALL, current)
}

fn other_compare(rng: &mut dyn RngCore, current: CompareOperator) -> CompareOperator {
    pick_other(rng, &CompareOperator::ALL, current)
}

fn other_updatable_binary(rng: &mut dyn RngCore, current: BinaryOperator) -> BinaryOperator {
    let updatable: Vec<BinaryOperator> = BinaryOperator::ALL.into_iter().filter(|op| op.is_updatable()).collect();
    pick_other(rng, &updatable, current)
}

fn pick_other<T: Copy + PartialEq>(rng: &mut dyn RngCore, all: &[T], current: T) -> T {
    let others: Vec<T> = all.iter().copied().filter(|candidate| *candidate != current).collect();
    *others.choose(rng).unwrap_or(&current)
}

fn random_method_name(rng: &mut dyn RngCore, current: &SmolStr) -> SmolStr {
    random_name(rng, current)
}

fn random_property_name(rng: &mut dyn RngCore, current: &SmolStr) -> SmolStr {
    random_name(rng, current)
}

fn random_name(rng: &mut dyn RngCore, current: &SmolStr) -> SmolStr {
    let others: Vec<&str> = LITERAL_NAMES.iter().copied().filter(|name| *name != current.as_str()).collect();
    match others.choose(rng) {
        Some(name) => SmolStr::new(*name),
        None => current.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fuzzilu_ir::builder::ProgramSource;
    use fuzzilu_ir::Program;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct EmptyCorpus;
    impl ProgramSource for EmptyCorpus {
        fn random_program(&self) -> Option<&Program> {
            None
        }
    }

    fn binary_add_program() -> Program {
        let environment = Environment::lua_stdlib();
        let mut builder = ProgramBuilder::new(&environment);
        let lhs = builder.load_integer(1);
        let rhs = builder.load_integer(2);
        let output = builder.allocate();
        builder.emit(Instruction::new(Operation::Binary(BinaryOperator::Add), Inouts::new(vec![lhs, rhs], vec![output], vec![])));
        builder.finalize()
    }

    #[test]
    fn substitutes_a_binary_operator() {
        let environment = Environment::lua_stdlib();
        let parent = binary_add_program();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut saw_change = false;
        for _ in 0..50 {
            if let Some(child) = OperationMutator.mutate(&mut rng, &environment, &parent, &EmptyCorpus) {
                let op = child.code().get(2).unwrap().operation().clone();
                if op != Operation::Binary(BinaryOperator::Add) {
                    saw_change = true;
                    break;
                }
            }
        }
        assert!(saw_change, "expected at least one successful operator substitution across retries");
    }

    #[test]
    fn discards_when_there_is_nothing_mutable() {
        let environment = Environment::lua_stdlib();
        let mut builder = ProgramBuilder::new(&environment);
        builder.load_nil();
        let parent = builder.finalize();
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(OperationMutator.mutate(&mut rng, &environment, &parent, &EmptyCorpus).is_none());
    }
}
