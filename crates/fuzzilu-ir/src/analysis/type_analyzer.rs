use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::rc::Rc;

use crate::instruction::operators::BinaryOperator;
use crate::instruction::{Instruction, Operation};
use crate::types::{LuaType, Signature};
use crate::variable::Variable;

#[derive(Debug, Clone, Default)]
struct BranchState {
    types: HashMap<Variable, LuaType>,
    is_subroutine: bool,
    return_type: Option<LuaType>,
    has_returned: bool,
}

#[derive(Debug, Clone)]
struct Level {
    branches: Vec<BranchState>,
    active: usize,
}

impl Level {
    fn new() -> Self {
        Level {
            branches: Vec::new(),
            active: 0,
        }
    }

    fn current(&self) -> &BranchState {
        &self.branches[self.active]
    }

    fn current_mut(&mut self) -> &mut BranchState {
        &mut self.branches[self.active]
    }

    fn enter_branch(&mut self) {
        self.branches.push(BranchState::default());
        self.active = self.branches.len() - 1;
    }
}

/// Flow-sensitive inference over conditional branches and subroutine
/// bodies. Maintains a stack of "levels," each a list of sibling branch
/// states; an if/else, a loop body, or a subroutine all push one level
/// while they're open and merge it back into the parent on exit.
///
/// Environment-dependent results (the type of a `LoadBuiltin`, the
/// signature behind a `CallMethod`) are outside what this type can know
/// from the instruction alone — callers with access to the environment
/// model should follow a `step` of those instructions with an explicit
/// [`TypeAnalyzer::set_type`] to refine the default `anything` it
/// assigns them.
#[derive(Debug, Clone)]
pub struct TypeAnalyzer {
    levels: Vec<Level>,
    pending_signature: Option<Rc<Signature>>,
}

impl Default for TypeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeAnalyzer {
    pub fn new() -> Self {
        let mut root = Level::new();
        root.enter_branch();
        TypeAnalyzer {
            levels: vec![root],
            pending_signature: None,
        }
    }

    pub fn type_of(&self, variable: Variable) -> LuaType {
        Self::type_of_in(&self.levels, variable)
    }

    fn type_of_in(levels: &[Level], variable: Variable) -> LuaType {
        for level in levels.iter().rev() {
            if let Some(ty) = level.current().types.get(&variable) {
                return ty.clone();
            }
        }
        LuaType::anything()
    }

    pub fn set_type(&mut self, variable: Variable, ty: LuaType) {
        self.levels
            .last_mut()
            .expect("root level is never popped")
            .current_mut()
            .types
            .insert(variable, ty);
    }

    pub fn has_returned(&self) -> bool {
        self.levels
            .last()
            .expect("root level is never popped")
            .current()
            .has_returned
    }

    fn start_group(&mut self) {
        let mut level = Level::new();
        level.enter_branch();
        self.levels.push(level);
    }

    fn enter_sibling_branch(&mut self) {
        self.levels
            .last_mut()
            .expect("a group must be started before entering a sibling branch")
            .enter_branch();
    }

    fn end_group(&mut self) {
        let level = self.levels.pop().expect("end_group without a matching start");
        self.merge_level(level);
    }

    fn merge_level(&mut self, level: Level) -> LuaType {
        let mut touched: HashSet<Variable> = HashSet::new();
        for branch in &level.branches {
            touched.extend(branch.types.keys().copied());
        }
        let num_branches = level.branches.len();
        for variable in touched {
            let assigned_everywhere = level
                .branches
                .iter()
                .all(|branch| branch.types.contains_key(&variable));
            let merged = if assigned_everywhere {
                level
                    .branches
                    .iter()
                    .map(|branch| branch.types[&variable].clone())
                    .reduce(|a, b| a.union(&b))
                    .unwrap_or_else(LuaType::nothing)
            } else {
                let mut acc = Self::type_of_in(&self.levels, variable);
                for branch in &level.branches {
                    if let Some(ty) = branch.types.get(&variable) {
                        acc = acc.union(ty);
                    }
                }
                acc
            };
            self.set_type(variable, merged.clone());
        }

        let all_returned = num_branches > 0 && level.branches.iter().all(|b| b.has_returned);
        if all_returned {
            self.levels
                .last_mut()
                .expect("root level is never popped")
                .current_mut()
                .has_returned = true;
        }

        let return_type = level
            .branches
            .iter()
            .find(|b| b.is_subroutine)
            .and_then(|b| b.return_type.clone())
            .unwrap_or_else(LuaType::undefined);
        return_type
    }

    fn start_subroutine(&mut self) {
        // Branch 0: the function is never called — surrounding state is
        // left untouched. Branch 1 (entered by the caller once the
        // signature's parameters have been bound) is the body.
        self.start_group();
    }

    fn enter_subroutine_body(&mut self) {
        self.enter_sibling_branch();
        self.levels
            .last_mut()
            .expect("start_subroutine pushed a level")
            .current_mut()
            .is_subroutine = true;
    }

    fn end_subroutine(&mut self) -> LuaType {
        let level = self.levels.pop().expect("end_subroutine without start_subroutine");
        self.merge_level(level)
    }

    fn record_return(&mut self, values: &[LuaType]) {
        let combined = values
            .iter()
            .cloned()
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(LuaType::undefined);
        let branch = self
            .levels
            .last_mut()
            .expect("root level is never popped")
            .current_mut();
        branch.return_type = Some(match branch.return_type.take() {
            Some(existing) => existing.union(&combined),
            None => combined,
        });
        branch.has_returned = true;
    }

    /// Advance the analyzer by one instruction, inferring and recording
    /// the type of every output it defines.
    pub fn step(&mut self, instruction: &Instruction) {
        match instruction.operation() {
            Operation::LoadInteger(_) => self.assign_output(instruction, LuaType::integer()),
            Operation::LoadFloat(_) => self.assign_output(instruction, LuaType::float()),
            Operation::LoadString(_) => self.assign_output(instruction, LuaType::string()),
            Operation::LoadBoolean(_) => self.assign_output(instruction, LuaType::boolean()),
            Operation::LoadNil => self.assign_output(instruction, LuaType::nil()),
            Operation::LoadUndefined => self.assign_output(instruction, LuaType::undefined()),
            Operation::LoadBuiltin(_) => self.assign_output(instruction, LuaType::anything()),
            Operation::LoadPair => self.assign_output(instruction, LuaType::anything()),

            Operation::Unary(_) => {
                let operand = self.type_of(instruction.inputs()[0]);
                let result = if operand.possible().contains(crate::types::TypeSet::STRING) {
                    LuaType::anything()
                } else {
                    LuaType::number()
                };
                self.assign_output(instruction, result);
            }
            Operation::Binary(op) => {
                let lhs = self.type_of(instruction.inputs()[0]);
                let rhs = self.type_of(instruction.inputs()[1]);
                self.assign_output(instruction, Self::binary_result_type(*op, &lhs, &rhs));
            }
            Operation::Compare(_) => self.assign_output(instruction, LuaType::boolean()),
            Operation::Update(op) => {
                let lhs = self.type_of(instruction.inputs()[0]);
                let rhs = self.type_of(instruction.inputs()[1]);
                self.assign_output(instruction, Self::binary_result_type(*op, &lhs, &rhs));
            }
            Operation::Reassign => {
                let rhs = self.type_of(instruction.inputs()[1]);
                self.assign_output(instruction, rhs);
            }

            Operation::BeginTable => {
                self.assign_inner_output(instruction, LuaType::object(None));
            }
            Operation::EndTable => {
                let ty = self.type_of(instruction.inputs()[0]);
                self.assign_output(instruction, ty);
            }
            Operation::TableAddProperty { name } => {
                let table = instruction.inputs()[0];
                let value_ty = self.type_of(instruction.inputs()[1]);
                let updated = self.type_of(table).adding_property(name.as_str(), value_ty);
                self.set_type(table, updated);
            }
            Operation::TableAddElement => {
                let table = instruction.inputs()[0];
                let element_ty = self.type_of(instruction.inputs()[1]);
                let updated = self.type_of(table).adding_index(element_ty);
                self.set_type(table, updated);
            }
            Operation::BeginTableMethod { signature, .. } => {
                self.pending_signature = Some(Rc::clone(signature));
                self.start_subroutine();
                self.enter_subroutine_body();
                for (param, &variable) in signature.parameters().iter().zip(instruction.inner_outputs().iter().skip(1)) {
                    self.set_type(variable, param.ty().clone());
                }
                if let Some(&receiver) = instruction.inner_outputs().first() {
                    self.set_type(receiver, LuaType::object(None));
                }
            }
            Operation::EndTableMethod => {
                self.end_subroutine();
            }
            Operation::CreateArray { .. } => {
                self.assign_output(instruction, LuaType::object(None).adding_index(LuaType::anything()));
            }

            Operation::GetProperty { name } => {
                let table = self.type_of(instruction.inputs()[0]);
                let ty = table.type_of_property(name).unwrap_or_else(LuaType::anything);
                self.assign_output(instruction, ty);
            }
            Operation::SetProperty { name } => {
                let table = instruction.inputs()[0];
                let value_ty = self.type_of(instruction.inputs()[1]);
                let updated = self.type_of(table).adding_property(name.as_str(), value_ty);
                self.set_type(table, updated);
            }
            Operation::UpdateProperty { name, op } => {
                let table = instruction.inputs()[0];
                let current = self
                    .type_of(table)
                    .type_of_property(name)
                    .unwrap_or_else(LuaType::anything);
                let rhs = self.type_of(instruction.inputs()[1]);
                let result = Self::binary_result_type(*op, &current, &rhs);
                let updated = self.type_of(table).adding_property(name.as_str(), result);
                self.set_type(table, updated);
            }
            Operation::DeleteProperty { name } => {
                let table = instruction.inputs()[0];
                let updated = self.type_of(table).removing_property(name);
                self.set_type(table, updated);
            }
            Operation::GetElement | Operation::SetElement | Operation::UpdateElement { .. } | Operation::DeleteElement => {
                if let Some(&output) = instruction.outputs().first() {
                    self.set_type(output, LuaType::anything());
                }
            }

            Operation::BeginIf { .. } => self.start_group(),
            Operation::BeginElse => self.enter_sibling_branch(),
            Operation::EndIf => {
                self.end_group();
            }

            Operation::BeginWhileHeader => self.start_group(),
            Operation::BeginWhileBody => self.enter_sibling_branch(),
            Operation::EndWhile => {
                self.end_group();
            }

            Operation::BeginForInitializer => {
                self.start_group();
                if let Some(&v) = instruction.inner_outputs().first() {
                    self.set_type(v, LuaType::anything());
                }
            }
            Operation::BeginForCondition | Operation::BeginForAfterthought => {
                if let Some(&v) = instruction.inner_outputs().first() {
                    self.set_type(v, LuaType::anything());
                }
            }
            Operation::BeginForBody => {
                self.enter_sibling_branch();
                if let Some(&v) = instruction.inner_outputs().first() {
                    self.set_type(v, LuaType::anything());
                }
            }
            Operation::EndFor => {
                self.end_group();
            }

            Operation::BeginForIn { .. } => {
                self.start_group();
                self.enter_sibling_branch();
                for &v in instruction.inner_outputs() {
                    self.set_type(v, LuaType::anything());
                }
            }
            Operation::EndForIn => {
                self.end_group();
            }

            // `repeat ... until` always runs its body at least once, so
            // unlike the other loop forms it is not modelled as a
            // maybe-zero-iterations branch group.
            Operation::BeginRepeat { has_counter } => {
                if *has_counter {
                    if let Some(&counter) = instruction.inner_outputs().first() {
                        self.set_type(counter, LuaType::integer());
                    }
                }
            }
            Operation::EndRepeat => {}

            Operation::Label => {
                if let Some(&v) = instruction.outputs().first() {
                    self.set_type(v, LuaType::anything());
                }
            }
            Operation::LoopBreak | Operation::Goto | Operation::Nop => {}

            Operation::BeginFunction { signature, .. } => {
                self.pending_signature = Some(Rc::clone(signature));
                self.start_subroutine();
                self.enter_subroutine_body();
                for (param, &variable) in signature.parameters().iter().zip(instruction.inner_outputs()) {
                    self.set_type(variable, param.ty().clone());
                }
            }
            Operation::EndFunction => {
                self.end_subroutine();
                let signature = self.pending_signature.take();
                let ty = match signature {
                    Some(sig) => LuaType::function((*sig).clone()),
                    None => LuaType::function(
                        Signature::new(Vec::new(), vec![LuaType::anything()])
                            .expect("empty parameter list is always valid"),
                    ),
                };
                self.assign_output(instruction, ty);
            }
            Operation::Return => {
                let values: Vec<LuaType> = instruction.inputs().iter().map(|&v| self.type_of(v)).collect();
                self.record_return(&values);
            }
            Operation::CallFunction { .. } => {
                let callee = self.type_of(instruction.inputs()[0]);
                let ty = callee
                    .extension()
                    .and_then(|ext| ext.signature.as_ref())
                    .map(|sig| sig.return_at(0))
                    .unwrap_or_else(LuaType::anything);
                self.assign_output(instruction, ty);
            }
            Operation::CallMethod { .. } => {
                self.assign_output(instruction, LuaType::anything());
            }
        }
    }

    fn assign_output(&mut self, instruction: &Instruction, ty: LuaType) {
        if let Some(&output) = instruction.outputs().first() {
            self.set_type(output, ty);
        }
    }

    fn assign_inner_output(&mut self, instruction: &Instruction, ty: LuaType) {
        if let Some(&output) = instruction.inner_outputs().first() {
            self.set_type(output, ty);
        }
    }

    fn binary_result_type(op: BinaryOperator, lhs: &LuaType, rhs: &LuaType) -> LuaType {
        use crate::types::TypeSet;
        match op {
            BinaryOperator::Concat => LuaType::string(),
            BinaryOperator::And | BinaryOperator::Or => {
                if lhs.possible().contains(TypeSet::BOOLEAN) || rhs.possible().contains(TypeSet::BOOLEAN) {
                    LuaType::boolean()
                } else {
                    rhs.clone()
                }
            }
            _ => {
                if lhs.definite().contains(TypeSet::INTEGER) && rhs.definite().contains(TypeSet::INTEGER) {
                    LuaType::integer()
                } else {
                    LuaType::number()
                }
            }
        }
    }
}
