//! Concrete code generators and value generators, and the weighted
//! table the builder draws from.

use rand::seq::SliceRandom;
use rand::Rng;
use smol_str::SmolStr;

use super::ProgramBuilder;
use crate::context::Context;
use crate::instruction::operators::{BinaryOperator, CompareOperator, UnaryOperator};
use crate::instruction::{Inouts, Instruction, Operation};
use crate::types::{LuaType, TypeSet};
use crate::variable::Variable;

/// One weighted, context-gated producer of instructions. The builder
/// calls [`CodeGenerator::generate`] with a budget that is only
/// meaningful when [`CodeGenerator::is_recursive`] is true (e.g. an
/// `if` generator spending it on its branches via
/// [`ProgramBuilder::build_recursive`]).
pub trait CodeGenerator {
    fn name(&self) -> &'static str;

    /// Context bits the builder's current position must already have
    /// open for this generator to run. `Context::empty()` (the
    /// default) means "usable anywhere."
    fn required_context(&self) -> Context {
        Context::empty()
    }

    /// True for generators that need zero visible variables and exist
    /// to create some — consulted by [`ProgramBuilder::build_prefix`].
    fn is_value_generator(&self) -> bool {
        false
    }

    fn is_recursive(&self) -> bool {
        false
    }

    fn generate(&self, builder: &mut ProgramBuilder, budget: u32);
}

/// A weighted, context-filtered pool of [`CodeGenerator`]s.
pub struct GeneratorTable {
    entries: Vec<(Box<dyn CodeGenerator>, u32)>,
}

impl GeneratorTable {
    pub fn new() -> Self {
        GeneratorTable { entries: Vec::new() }
    }

    pub fn register(&mut self, generator: impl CodeGenerator + 'static, weight: u32) {
        self.entries.push((Box::new(generator), weight));
    }

    /// Randomizes every weight in place — the builder's `--swarmTesting`
    /// mode biases which generators a given fuzzer instance favors.
    pub fn randomize_weights(&mut self) {
        let mut rng = rand::thread_rng();
        for (_, weight) in &mut self.entries {
            *weight = rng.gen_range(1..=10);
        }
    }

    pub fn pick_eligible(&self, context: Context) -> Option<&dyn CodeGenerator> {
        let eligible: Vec<(&dyn CodeGenerator, u32)> = self
            .entries
            .iter()
            .filter(|(g, _)| context.contains(g.required_context()))
            .map(|(g, w)| (g.as_ref(), *w))
            .collect();
        weighted_pick(&eligible)
    }

    pub fn pick_value_generator(&self) -> Option<&dyn CodeGenerator> {
        let eligible: Vec<(&dyn CodeGenerator, u32)> = self
            .entries
            .iter()
            .filter(|(g, _)| g.is_value_generator())
            .map(|(g, w)| (g.as_ref(), *w))
            .collect();
        weighted_pick(&eligible)
    }

    pub fn lua_default() -> Self {
        let mut table = GeneratorTable::new();
        table.register(IntegerGenerator, 10);
        table.register(FloatGenerator, 6);
        table.register(StringGenerator, 8);
        table.register(BooleanGenerator, 4);
        table.register(NilGenerator, 2);
        table.register(BuiltinGenerator, 6);

        table.register(UnaryOperationGenerator, 6);
        table.register(BinaryOperationGenerator, 10);
        table.register(ComparisonGenerator, 6);
        table.register(ReassignGenerator, 6);
        table.register(TableGenerator, 6);
        table.register(ArrayGenerator, 5);
        table.register(PropertyStoreGenerator, 6);
        table.register(PropertyLoadGenerator, 6);
        table.register(FunctionCallGenerator, 8);
        table.register(ReturnGenerator, 3);

        table.register(IfElseGenerator, 8);
        table.register(WhileLoopGenerator, 4);
        table.register(ForLoopGenerator, 4);
        table.register(ForInGenerator, 3);
        table.register(RepeatGenerator, 3);
        table.register(FunctionDefinitionGenerator, 5);

        table
    }
}

impl Default for GeneratorTable {
    fn default() -> Self {
        Self::new()
    }
}

fn weighted_pick<'a>(entries: &[(&'a dyn CodeGenerator, u32)]) -> Option<&'a dyn CodeGenerator> {
    if entries.is_empty() {
        return None;
    }
    let total: u32 = entries.iter().map(|(_, w)| *w).sum();
    if total == 0 {
        return entries.choose(&mut rand::thread_rng()).map(|(g, _)| *g);
    }
    let mut choice = rand::thread_rng().gen_range(0..total);
    for (generator, weight) in entries {
        if choice < *weight {
            return Some(*generator);
        }
        choice -= weight;
    }
    entries.last().map(|(g, _)| *g)
}

fn random_literal_name(rng: &mut impl Rng) -> SmolStr {
    const NAMES: [&str; 6] = ["x", "y", "value", "data", "key", "n"];
    SmolStr::new(*NAMES.choose(rng).unwrap())
}

// ---- value generators ----

macro_rules! value_generator {
    ($name:ident, $body:expr) => {
        pub struct $name;
        impl CodeGenerator for $name {
            fn name(&self) -> &'static str {
                stringify!($name)
            }
            fn is_value_generator(&self) -> bool {
                true
            }
            fn generate(&self, builder: &mut ProgramBuilder, _budget: u32) {
                #[allow(clippy::redundant_closure_call)]
                ($body)(builder)
            }
        }
    };
}

value_generator!(IntegerGenerator, |b: &mut ProgramBuilder| {
    let mut rng = rand::thread_rng();
    let value = if rng.gen_bool(0.5) {
        *b.environment().interesting_integers().choose(&mut rng).unwrap_or(&0)
    } else {
        rng.gen_range(-1000..1000)
    };
    b.load_integer(value);
});

value_generator!(FloatGenerator, |b: &mut ProgramBuilder| {
    let mut rng = rand::thread_rng();
    let value = if rng.gen_bool(0.5) {
        *b.environment().interesting_floats().choose(&mut rng).unwrap_or(&0.0)
    } else {
        rng.gen_range(-1000.0..1000.0)
    };
    b.load_float(value);
});

value_generator!(StringGenerator, |b: &mut ProgramBuilder| {
    let mut rng = rand::thread_rng();
    let value = if rng.gen_bool(0.5) {
        b.environment().interesting_strings().choose(&mut rng).cloned().unwrap_or_default()
    } else {
        random_literal_name(&mut rng)
    };
    b.load_string(value);
});

value_generator!(BooleanGenerator, |b: &mut ProgramBuilder| {
    let value = rand::thread_rng().gen_bool(0.5);
    b.load_boolean(value);
});

value_generator!(NilGenerator, |b: &mut ProgramBuilder| {
    b.load_nil();
});

value_generator!(BuiltinGenerator, |b: &mut ProgramBuilder| {
    let mut rng = rand::thread_rng();
    let names: Vec<&str> = b.environment().builtin_names().collect();
    if let Some(name) = names.choose(&mut rng) {
        b.load_builtin(*name);
    }
});

// ---- simple non-recursive generators ----

pub struct UnaryOperationGenerator;
impl CodeGenerator for UnaryOperationGenerator {
    fn name(&self) -> &'static str {
        "UnaryOperationGenerator"
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let Some(input) = b.random_variable() else { return };
        let op = *UnaryOperator::ALL.choose(&mut rand::thread_rng()).unwrap();
        let output = b.allocate();
        b.emit(Instruction::new(Operation::Unary(op), Inouts::new(vec![input], vec![output], vec![])));
    }
}

pub struct BinaryOperationGenerator;
impl CodeGenerator for BinaryOperationGenerator {
    fn name(&self) -> &'static str {
        "BinaryOperationGenerator"
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let Some(lhs) = b.random_variable() else { return };
        let Some(rhs) = b.random_variable() else { return };
        let op = *BinaryOperator::ALL.choose(&mut rand::thread_rng()).unwrap();
        let output = b.allocate();
        b.emit(Instruction::new(Operation::Binary(op), Inouts::new(vec![lhs, rhs], vec![output], vec![])));
    }
}

pub struct ComparisonGenerator;
impl CodeGenerator for ComparisonGenerator {
    fn name(&self) -> &'static str {
        "ComparisonGenerator"
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let Some(lhs) = b.random_variable() else { return };
        let Some(rhs) = b.random_variable() else { return };
        let op = *CompareOperator::ALL.choose(&mut rand::thread_rng()).unwrap();
        let output = b.allocate();
        b.emit(Instruction::new(Operation::Compare(op), Inouts::new(vec![lhs, rhs], vec![output], vec![])));
    }
}

pub struct ReassignGenerator;
impl CodeGenerator for ReassignGenerator {
    fn name(&self) -> &'static str {
        "ReassignGenerator"
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let Some(target) = b.random_variable() else { return };
        let Some(value) = b.random_variable() else { return };
        let output = b.allocate();
        b.emit(Instruction::new(Operation::Reassign, Inouts::new(vec![target, value], vec![output], vec![])));
    }
}

pub struct TableGenerator;
impl CodeGenerator for TableGenerator {
    fn name(&self) -> &'static str {
        "TableGenerator"
    }
    fn is_value_generator(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let table = b.allocate();
        b.emit(Instruction::new(Operation::BeginTable, Inouts::new(vec![], vec![], vec![table])));
        let mut rng = rand::thread_rng();
        let property_count = rng.gen_range(0..=3);
        for _ in 0..property_count {
            let Some(value) = b.random_variable().filter(|&v| v != table) else { break };
            let name = random_literal_name(&mut rng);
            b.emit(Instruction::new(
                Operation::TableAddProperty { name },
                Inouts::new(vec![table, value], vec![], vec![]),
            ));
        }
        let output = b.allocate();
        b.emit(Instruction::new(Operation::EndTable, Inouts::new(vec![table], vec![output], vec![])));
    }
}

pub struct ArrayGenerator;
impl CodeGenerator for ArrayGenerator {
    fn name(&self) -> &'static str {
        "ArrayGenerator"
    }
    fn is_value_generator(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let mut rng = rand::thread_rng();
        let count = rng.gen_range(0..=3);
        let elements: Vec<Variable> = (0..count).filter_map(|_| b.random_variable()).collect();
        let output = b.allocate();
        b.emit(Instruction::new(
            Operation::CreateArray { first_variadic_input: 0 },
            Inouts::new(elements, vec![output], vec![]),
        ));
    }
}

pub struct PropertyStoreGenerator;
impl CodeGenerator for PropertyStoreGenerator {
    fn name(&self) -> &'static str {
        "PropertyStoreGenerator"
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let object_ty = LuaType::plain(TypeSet::OBJECT);
        let Some(table) = b.random_variable_of_type(&object_ty) else { return };
        let Some(value) = b.random_variable() else { return };
        let name = random_literal_name(&mut rand::thread_rng());
        b.emit(Instruction::new(Operation::SetProperty { name }, Inouts::new(vec![table, value], vec![], vec![])));
    }
}

pub struct PropertyLoadGenerator;
impl CodeGenerator for PropertyLoadGenerator {
    fn name(&self) -> &'static str {
        "PropertyLoadGenerator"
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let object_ty = LuaType::plain(TypeSet::OBJECT);
        let Some(table) = b.random_variable_of_type(&object_ty) else { return };
        let name = random_literal_name(&mut rand::thread_rng());
        let output = b.allocate();
        b.emit(Instruction::new(Operation::GetProperty { name }, Inouts::new(vec![table], vec![output], vec![])));
    }
}

pub struct FunctionCallGenerator;
impl CodeGenerator for FunctionCallGenerator {
    fn name(&self) -> &'static str {
        "FunctionCallGenerator"
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let function_ty = LuaType::plain(TypeSet::FUNCTION);
        let Some(callee) = b.random_variable_of_type(&function_ty) else { return };
        let mut rng = rand::thread_rng();
        let argument_count = rng.gen_range(0..=2);
        let arguments: Vec<Variable> = (0..argument_count).filter_map(|_| b.random_variable()).collect();
        let mut inputs = vec![callee];
        inputs.extend(arguments);
        let output = b.allocate();
        b.emit(Instruction::new(
            Operation::CallFunction { first_variadic_input: 1 },
            Inouts::new(inputs, vec![output], vec![]),
        ));
    }
}

pub struct ReturnGenerator;
impl CodeGenerator for ReturnGenerator {
    fn name(&self) -> &'static str {
        "ReturnGenerator"
    }
    fn required_context(&self) -> Context {
        Context::SUBROUTINE
    }
    fn generate(&self, b: &mut ProgramBuilder, _budget: u32) {
        let values: Vec<Variable> = b.random_variable().into_iter().collect();
        b.emit(Instruction::new(Operation::Return, Inouts::new(values, vec![], vec![])));
    }
}

// ---- recursive, block-structured generators ----

pub struct IfElseGenerator;
impl CodeGenerator for IfElseGenerator {
    fn name(&self) -> &'static str {
        "IfElseGenerator"
    }
    fn is_recursive(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, budget: u32) {
        let boolean_ty = LuaType::boolean();
        let condition = b.random_variable_of_type(&boolean_ty).unwrap_or_else(|| b.load_boolean(true));
        b.emit(Instruction::new(Operation::BeginIf { inverted: false }, Inouts::new(vec![condition], vec![], vec![])));
        let per_branch = (budget / 2).max(1);
        b.build_recursive(per_branch);
        b.emit(Instruction::new(Operation::BeginElse, Inouts::new(vec![], vec![], vec![])));
        b.build_recursive(per_branch);
        b.emit(Instruction::new(Operation::EndIf, Inouts::new(vec![], vec![], vec![])));
    }
}

pub struct WhileLoopGenerator;
impl CodeGenerator for WhileLoopGenerator {
    fn name(&self) -> &'static str {
        "WhileLoopGenerator"
    }
    fn is_recursive(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, budget: u32) {
        b.emit(Instruction::new(Operation::BeginWhileHeader, Inouts::new(vec![], vec![], vec![])));
        let boolean_ty = LuaType::boolean();
        let condition = b.random_variable_of_type(&boolean_ty).unwrap_or_else(|| b.load_boolean(true));
        b.emit(Instruction::new(Operation::BeginWhileBody, Inouts::new(vec![condition], vec![], vec![])));
        b.build_recursive(budget);
        b.emit(Instruction::new(Operation::EndWhile, Inouts::new(vec![], vec![], vec![])));
    }
}

pub struct ForLoopGenerator;
impl CodeGenerator for ForLoopGenerator {
    fn name(&self) -> &'static str {
        "ForLoopGenerator"
    }
    fn is_recursive(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, budget: u32) {
        let init_var = b.allocate();
        b.emit(Instruction::new(Operation::BeginForInitializer, Inouts::new(vec![], vec![], vec![init_var])));
        let cond_var = b.allocate();
        b.emit(Instruction::new(Operation::BeginForCondition, Inouts::new(vec![], vec![], vec![cond_var])));
        let after_var = b.allocate();
        b.emit(Instruction::new(Operation::BeginForAfterthought, Inouts::new(vec![], vec![], vec![after_var])));
        let body_var = b.allocate();
        b.emit(Instruction::new(Operation::BeginForBody, Inouts::new(vec![], vec![], vec![body_var])));
        b.build_recursive((budget / 3).max(1));
        b.emit(Instruction::new(Operation::EndFor, Inouts::new(vec![], vec![], vec![])));
    }
}

pub struct ForInGenerator;
impl CodeGenerator for ForInGenerator {
    fn name(&self) -> &'static str {
        "ForInGenerator"
    }
    fn is_recursive(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, budget: u32) {
        let object_ty = LuaType::plain(TypeSet::OBJECT);
        let Some(iterable) = b.random_variable_of_type(&object_ty) else { return };
        let key_var = b.allocate();
        let value_var = b.allocate();
        b.emit(Instruction::new(
            Operation::BeginForIn { num_loop_variables: 2 },
            Inouts::new(vec![iterable], vec![], vec![key_var, value_var]),
        ));
        b.build_recursive(budget);
        b.emit(Instruction::new(Operation::EndForIn, Inouts::new(vec![], vec![], vec![])));
    }
}

pub struct RepeatGenerator;
impl CodeGenerator for RepeatGenerator {
    fn name(&self) -> &'static str {
        "RepeatGenerator"
    }
    fn is_recursive(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, budget: u32) {
        let has_counter = rand::thread_rng().gen_bool(0.3);
        let inner_outputs = if has_counter { vec![b.allocate()] } else { vec![] };
        b.emit(Instruction::new(Operation::BeginRepeat { has_counter }, Inouts::new(vec![], vec![], inner_outputs)));
        b.build_recursive(budget);
        let boolean_ty = LuaType::boolean();
        let until = b.random_variable_of_type(&boolean_ty).unwrap_or_else(|| b.load_boolean(true));
        b.emit(Instruction::new(Operation::EndRepeat, Inouts::new(vec![until], vec![], vec![])));
    }
}

pub struct FunctionDefinitionGenerator;
impl CodeGenerator for FunctionDefinitionGenerator {
    fn name(&self) -> &'static str {
        "FunctionDefinitionGenerator"
    }
    fn is_recursive(&self) -> bool {
        true
    }
    fn generate(&self, b: &mut ProgramBuilder, budget: u32) {
        let mut rng = rand::thread_rng();
        let num_parameters = rng.gen_range(0..=3);
        let signature = std::rc::Rc::new(b.synthesize_signature(num_parameters, 1));
        let parameters: Vec<Variable> = (0..num_parameters).map(|_| b.allocate()).collect();
        b.emit(Instruction::new(
            Operation::BeginFunction { signature: std::rc::Rc::clone(&signature), is_method: false },
            Inouts::new(vec![], vec![], parameters),
        ));
        b.build_recursive(budget);
        let output = b.allocate();
        b.emit(Instruction::new(Operation::EndFunction, Inouts::new(vec![], vec![output], vec![])));
    }
}
