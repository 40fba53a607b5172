use ahash::AHashSet as HashSet;

use crate::instruction::{Instruction, InstructionFlags, Operation};
use crate::variable::{Variable, VariableLocality};

/// Forward pass maintaining a stack of locals, matched to block nesting.
/// `ModuleGlobal` variables (Lua's implicit-global semantics: an
/// unqualified assignment inside a function body is visible outside it)
/// bypass the stack entirely and are tracked in a single flat set once
/// defined. Also tracks which variables are [`Operation::Label`]
/// outputs, queried by the builder/splicer when handling `Goto`.
#[derive(Debug, Clone, Default)]
pub struct ScopeAnalyzer {
    locals: Vec<HashSet<Variable>>,
    globals: HashSet<Variable>,
    labels: HashSet<Variable>,
}

impl ScopeAnalyzer {
    pub fn new() -> Self {
        ScopeAnalyzer {
            locals: vec![HashSet::new()],
            globals: HashSet::new(),
            labels: HashSet::new(),
        }
    }

    pub fn is_visible(&self, variable: Variable) -> bool {
        if variable.is_global() {
            self.globals.contains(&variable)
        } else {
            self.locals.iter().any(|frame| frame.contains(&variable))
        }
    }

    pub fn is_label(&self, variable: Variable) -> bool {
        self.labels.contains(&variable)
    }

    pub fn depth(&self) -> usize {
        self.locals.len()
    }

    /// Every variable visible at the current position: all locals in
    /// scope plus every global defined so far, in no particular order.
    pub fn visible_variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.locals.iter().flatten().copied().chain(self.globals.iter().copied())
    }

    /// The innermost block's own locals, used by variable selection's
    /// inner-scope bias. Does not include globals or outer frames.
    pub fn innermost_frame_variables(&self) -> &HashSet<Variable> {
        self.locals.last().expect("script-level frame is never popped")
    }

    pub fn step(&mut self, instruction: &Instruction) {
        let descriptor = instruction.descriptor();

        if descriptor.flags.contains(InstructionFlags::IS_BLOCK_END) {
            self.locals.pop();
        }

        for &variable in instruction.outputs() {
            self.define(variable);
        }
        if matches!(instruction.operation(), Operation::Label) {
            if let Some(&label) = instruction.outputs().first() {
                self.labels.insert(label);
            }
        }

        if descriptor.flags.contains(InstructionFlags::IS_BLOCK_START) {
            self.locals.push(HashSet::new());
        }
        for &variable in instruction.inner_outputs() {
            self.define(variable);
        }
    }

    fn define(&mut self, variable: Variable) {
        match variable.locality() {
            VariableLocality::ModuleGlobal => {
                self.globals.insert(variable);
            }
            VariableLocality::ScopedToBlock => {
                self.locals
                    .last_mut()
                    .expect("script-level frame is never popped")
                    .insert(variable);
            }
        }
    }
}
