//! Program construction: variable allocation, scope/hiding, random
//! variable selection, and the two-knob recursive budget model that
//! drives code generators (§4.6).

mod generators;

pub use generators::{CodeGenerator, GeneratorTable};

use ahash::AHashSet as HashSet;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::analysis::{ContextAnalyzer, ScopeAnalyzer, TypeAnalyzer};
use crate::code::Code;
use crate::context::Context;
use crate::environment::Environment;
use crate::instruction::{Inouts, Instruction, Operation};
use crate::limits::{
    INNER_SCOPE_PROBABILITY, MAX_CONSECUTIVE_NOPS, MIN_RECURSIVE_BUDGET,
    PARAMETER_ANYTHING_PROBABILITY, PARAMETER_BUCKET_THRESHOLD, PREFIX_MIN_VARIABLES,
    RECENT_VARIABLE_PROBABILITY, RECURSIVE_BUDGET_FRACTION,
};
use crate::program::{Program, ProgramId};
use crate::types::{LuaType, Parameter, Signature};
use crate::variable::{Variable, VariableAllocator, VariableLocality};

/// What a `build(n)` call is allowed to do with its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Generating,
    Splicing,
    Both,
}

struct BudgetFrame {
    remaining: u32,
    initial: u32,
    mode: BuildMode,
}

/// Supplies donor programs for the splicer; implemented by
/// `fuzzilu-corpus`'s corpus type. Kept as a trait here so `fuzzilu-ir`
/// never depends on the corpus crate.
pub trait ProgramSource {
    fn random_program(&self) -> Option<&Program>;
}

/// Drives emission of a single [`Program`]. Owns the variable
/// allocator and the three flow-insensitive analyzers plus the
/// flow-sensitive type analyzer, stepping all of them on every emitted
/// instruction so their state is always in sync with `code`.
pub struct ProgramBuilder<'e> {
    environment: &'e Environment,
    allocator: VariableAllocator,
    code: Code,
    context_analyzer: ContextAnalyzer,
    scope_analyzer: ScopeAnalyzer,
    type_analyzer: TypeAnalyzer,
    hidden: HashSet<Variable>,
    budget_stack: Vec<BudgetFrame>,
    consecutive_nops: u32,
    parent: Option<ProgramId>,
    current_generators: Option<&'e GeneratorTable>,
    current_source: Option<&'e dyn ProgramSource>,
}

impl<'e> ProgramBuilder<'e> {
    pub fn new(environment: &'e Environment) -> Self {
        ProgramBuilder {
            environment,
            allocator: VariableAllocator::new(),
            code: Code::new(),
            context_analyzer: ContextAnalyzer::new(),
            scope_analyzer: ScopeAnalyzer::new(),
            type_analyzer: TypeAnalyzer::new(),
            hidden: HashSet::default(),
            budget_stack: Vec::new(),
            consecutive_nops: 0,
            parent: None,
            current_generators: None,
            current_source: None,
        }
    }

    pub fn with_parent(environment: &'e Environment, parent: ProgramId) -> Self {
        let mut builder = Self::new(environment);
        builder.parent = Some(parent);
        builder
    }

    pub fn environment(&self) -> &'e Environment {
        self.environment
    }

    pub fn context(&self) -> Context {
        self.context_analyzer.current()
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn type_of(&self, variable: Variable) -> LuaType {
        self.type_analyzer.type_of(variable)
    }

    pub fn hide(&mut self, variable: Variable) {
        self.hidden.insert(variable);
    }

    pub fn unhide(&mut self, variable: Variable) {
        self.hidden.remove(&variable);
    }

    pub fn is_hidden(&self, variable: Variable) -> bool {
        self.hidden.contains(&variable)
    }

    pub fn finalize(self) -> Program {
        match self.parent {
            Some(parent) => Program::with_parent(self.code, parent),
            None => Program::new(self.code),
        }
    }

    /// Append `instruction` to the program and advance every analyzer.
    /// `instruction`'s outputs/inner-outputs must already have been
    /// allocated via [`ProgramBuilder::allocate`].
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.context_analyzer.step(&instruction);
        self.scope_analyzer.step(&instruction);
        self.type_analyzer.step(&instruction);
        self.code.push(instruction)
    }

    pub fn allocate(&mut self) -> Variable {
        self.allocate_with_locality(VariableLocality::ScopedToBlock)
    }

    /// Re-emits an instruction taken verbatim from another program
    /// (mutators rebuilding a child around a parent's existing code),
    /// observing its outputs first so later fresh `allocate` calls can't
    /// collide with a variable number the replayed code already uses.
    pub fn replay_instruction(&mut self, instruction: Instruction) {
        for output in instruction.inouts().all_outputs() {
            self.allocator.observe(output);
        }
        self.emit(instruction);
    }

    pub fn allocate_with_locality(&mut self, locality: VariableLocality) -> Variable {
        self.allocator.allocate(locality)
    }

    /// Every variable visible for random selection right now, minus
    /// anything currently [`ProgramBuilder::hide`]-d.
    pub fn visible_variables(&self) -> Vec<Variable> {
        self.scope_analyzer
            .visible_variables()
            .filter(|v| !self.hidden.contains(v))
            .collect()
    }

    /// Picks a visible variable biased toward recency (p ≈
    /// [`RECENT_VARIABLE_PROBABILITY`]) then toward the innermost scope
    /// (p ≈ [`INNER_SCOPE_PROBABILITY`]), falling back to a uniform
    /// draw over everything visible.
    pub fn random_variable(&self) -> Option<Variable> {
        let visible = self.visible_variables();
        if visible.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();

        if let Some(last) = self.code.last() {
            let recent: Vec<Variable> = last
                .outputs()
                .iter()
                .chain(last.inner_outputs())
                .copied()
                .filter(|v| visible.contains(v))
                .collect();
            if !recent.is_empty() && rng.gen_bool(RECENT_VARIABLE_PROBABILITY) {
                return recent.choose(&mut rng).copied();
            }
        }

        let inner: Vec<Variable> = self
            .scope_analyzer
            .innermost_frame_variables()
            .iter()
            .copied()
            .filter(|v| !self.hidden.contains(v))
            .collect();
        if !inner.is_empty() && rng.gen_bool(INNER_SCOPE_PROBABILITY) {
            return inner.choose(&mut rng).copied();
        }

        visible.choose(&mut rng).copied()
    }

    /// `randomVariable(forUseAs: required)`: as [`Self::random_variable`]
    /// but restricted to variables statically known to satisfy `required`.
    pub fn random_variable_of_type(&self, required: &LuaType) -> Option<Variable> {
        let mut rng = rand::thread_rng();
        let candidates: Vec<Variable> = self
            .visible_variables()
            .into_iter()
            .filter(|&v| self.type_of(v).is(required))
            .collect();
        candidates.choose(&mut rng).copied()
    }

    /// Buckets currently-visible variables by (structurally equal)
    /// static type, keeping only buckets with at least
    /// [`PARAMETER_BUCKET_THRESHOLD`] members. Quadratic in the visible
    /// count, which stays small enough in practice (single-digit to
    /// low-hundreds) for this to be a non-issue.
    fn populated_type_buckets(&self) -> Vec<LuaType> {
        let mut buckets: Vec<(LuaType, usize)> = Vec::new();
        for variable in self.visible_variables() {
            let ty = self.type_of(variable);
            if let Some(entry) = buckets.iter_mut().find(|(t, _)| *t == ty) {
                entry.1 += 1;
            } else {
                buckets.push((ty, 1));
            }
        }
        buckets
            .into_iter()
            .filter(|(_, count)| *count >= PARAMETER_BUCKET_THRESHOLD)
            .map(|(ty, _)| ty)
            .collect()
    }

    /// Synthesizes a plausible signature for a function created without
    /// an explicit one: parameter types are sampled from populated type
    /// buckets, occasionally falling back to `anything` to leave room
    /// for later mutation.
    pub fn synthesize_signature(&self, num_parameters: usize, num_returns: usize) -> Signature {
        let buckets = self.populated_type_buckets();
        let mut rng = rand::thread_rng();
        let parameters = (0..num_parameters)
            .map(|_| {
                let ty = if buckets.is_empty() || rng.gen_bool(PARAMETER_ANYTHING_PROBABILITY) {
                    LuaType::anything()
                } else {
                    buckets.choose(&mut rng).cloned().unwrap_or_else(LuaType::anything)
                };
                Parameter::Plain(ty)
            })
            .collect();
        let returns = (0..num_returns).map(|_| LuaType::anything()).collect();
        Signature::new(parameters, returns).expect("plain parameters are always validly ordered")
    }

    fn budget_remaining(&self) -> u32 {
        self.budget_stack.last().map(|f| f.remaining).unwrap_or(0)
    }

    fn budget_mode(&self) -> Option<BuildMode> {
        self.budget_stack.last().map(|f| f.mode)
    }

    /// Top-level entry point: push a budget frame of `n` steps in
    /// `mode`, then repeatedly run a random eligible generator (or
    /// splice from `source`) until the budget is exhausted or
    /// [`MAX_CONSECUTIVE_NOPS`] steps in a row did nothing. `generators`
    /// and `source` are stashed on `self` for the duration so that
    /// recursive generators can reach [`Self::build_recursive`] without
    /// threading them through [`CodeGenerator::generate`].
    pub fn build(&mut self, n: u32, mode: BuildMode, generators: &'e GeneratorTable, source: Option<&'e dyn ProgramSource>) {
        let outer_generators = self.current_generators.replace(generators);
        let outer_source = if source.is_some() {
            self.current_source.replace(source.unwrap())
        } else {
            self.current_source
        };

        self.budget_stack.push(BudgetFrame { remaining: n, initial: n, mode });
        self.consecutive_nops = 0;

        while self.budget_remaining() > 0 {
            if self.consecutive_nops >= MAX_CONSECUTIVE_NOPS {
                break;
            }
            let did_something = self.build_step();
            if did_something {
                self.consecutive_nops = 0;
            } else {
                self.consecutive_nops += 1;
            }
            if let Some(frame) = self.budget_stack.last_mut() {
                frame.remaining = frame.remaining.saturating_sub(1);
            }
        }

        self.budget_stack.pop();
        self.current_generators = outer_generators;
        self.current_source = outer_source;
    }

    fn build_step(&mut self) -> bool {
        let mode = self.budget_mode().unwrap_or(BuildMode::Generating);
        let generators = self.current_generators;
        let source = self.current_source;
        let try_splice = matches!(mode, BuildMode::Splicing | BuildMode::Both) && source.is_some();
        let try_generate = matches!(mode, BuildMode::Generating | BuildMode::Both) && generators.is_some();

        if try_splice && (!try_generate || rand::thread_rng().gen_bool(0.5)) {
            if let Some(donor) = source.and_then(|s| s.random_program()) {
                return crate::splicer::splice(self, donor, None);
            }
        }

        if try_generate {
            if let Some(generator) = generators.unwrap().pick_eligible(self.context()) {
                self.run_generator(generator);
                return true;
            }
        }

        false
    }

    fn run_generator(&mut self, generator: &dyn CodeGenerator) {
        if generator.is_recursive() {
            let parent_initial = self.budget_stack.last().map(|f| f.initial).unwrap_or(0);
            let (lo, hi) = RECURSIVE_BUDGET_FRACTION;
            let fraction = rand::thread_rng().gen_range(lo..=hi);
            let child_budget = ((parent_initial as f64 * fraction) as u32).max(1);
            generator.generate(self, child_budget);
        } else {
            generator.generate(self, 0);
        }
    }

    /// A recursive generator's callback into a child block: disabled
    /// (falls back to a trivial empty block) once the remaining parent
    /// budget drops below [`MIN_RECURSIVE_BUDGET`]. Reuses whichever
    /// generator table and splice source the enclosing [`Self::build`]
    /// call was given.
    pub fn build_recursive(&mut self, budget: u32) {
        if self.budget_remaining() < MIN_RECURSIVE_BUDGET {
            return;
        }
        let Some(generators) = self.current_generators else { return };
        let source = self.current_source;
        self.build(budget, BuildMode::Generating, generators, source);
    }

    /// Runs value generators (constants, tables, functions — anything
    /// that needs zero inputs) until at least
    /// [`PREFIX_MIN_VARIABLES`] variables are visible, so later
    /// generators have something to consume.
    pub fn build_prefix(&mut self, generators: &GeneratorTable) {
        let mut guard = 0;
        while self.visible_variables().len() < PREFIX_MIN_VARIABLES && guard < PREFIX_MIN_VARIABLES * 4 {
            match generators.pick_value_generator() {
                Some(generator) => self.run_generator(generator),
                None => break,
            }
            guard += 1;
        }
    }

    pub fn load_integer(&mut self, value: i64) -> Variable {
        let output = self.allocate();
        self.emit(Instruction::new(Operation::LoadInteger(value), Inouts::new(vec![], vec![output], vec![])));
        output
    }

    pub fn load_float(&mut self, value: f64) -> Variable {
        let output = self.allocate();
        self.emit(Instruction::new(Operation::LoadFloat(value), Inouts::new(vec![], vec![output], vec![])));
        output
    }

    pub fn load_string(&mut self, value: impl Into<smol_str::SmolStr>) -> Variable {
        let output = self.allocate();
        self.emit(Instruction::new(Operation::LoadString(value.into()), Inouts::new(vec![], vec![output], vec![])));
        output
    }

    pub fn load_boolean(&mut self, value: bool) -> Variable {
        let output = self.allocate();
        self.emit(Instruction::new(Operation::LoadBoolean(value), Inouts::new(vec![], vec![output], vec![])));
        output
    }

    pub fn load_nil(&mut self) -> Variable {
        let output = self.allocate();
        self.emit(Instruction::new(Operation::LoadNil, Inouts::new(vec![], vec![output], vec![])));
        output
    }

    pub fn load_builtin(&mut self, name: impl Into<smol_str::SmolStr>) -> Variable {
        let output = self.allocate();
        self.emit(Instruction::new(Operation::LoadBuiltin(name.into()), Inouts::new(vec![], vec![output], vec![])));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hiding_a_variable_removes_it_from_visible_and_unhiding_restores_it() {
        let environment = Environment::lua_stdlib();
        let mut builder = ProgramBuilder::new(&environment);
        let v = builder.load_integer(1);
        assert!(builder.visible_variables().contains(&v));

        builder.hide(v);
        assert!(builder.is_hidden(v));
        assert!(!builder.visible_variables().contains(&v));

        builder.unhide(v);
        assert!(!builder.is_hidden(v));
        assert!(builder.visible_variables().contains(&v));
    }

    #[test]
    fn hidden_variable_is_never_picked_by_random_variable() {
        let environment = Environment::lua_stdlib();
        let mut builder = ProgramBuilder::new(&environment);
        let only = builder.load_integer(1);
        builder.hide(only);
        assert_eq!(builder.random_variable(), None);
    }
}
