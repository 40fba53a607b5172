use ahash::AHashSet as HashSet;

use thiserror::Error;

use crate::code::Code;
use crate::context::Context;
use crate::instruction::InstructionFlags;
use crate::limits::MAX_VARIABLES;
use crate::variable::Variable;

/// Reasons a [`Code`] can fail static validation (§4.3).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidityError {
    #[error("instruction {pc}: use of out-of-scope variable {variable:?}")]
    OutOfScopeUse { pc: usize, variable: Variable },
    #[error("instruction {pc}: required context not satisfied")]
    ContextMismatch { pc: usize },
    #[error("instruction {pc}: unbalanced block")]
    UnbalancedBlock { pc: usize },
    #[error("instruction {pc}: duplicate output {variable:?}")]
    DuplicateOutput { pc: usize, variable: Variable },
    #[error("instruction {pc}: use of variable {variable:?} before its definition")]
    UseBeforeDefinition { pc: usize, variable: Variable },
    #[error("instruction {pc}: variable number {variable:?} exceeds the configured maximum")]
    VariableLimitExceeded { pc: usize, variable: Variable },
}

/// One linear forward scan implementing every rule in §4.3: a context
/// stack, a stack of per-block visible-variable sets, and a block-start
/// stack for start/end pairing.
pub struct Validator;

impl Validator {
    pub fn validate(code: &Code) -> Result<(), ValidityError> {
        let mut context_stack: Vec<Context> = vec![Context::script()];
        let mut scope_stack: Vec<HashSet<Variable>> = vec![HashSet::new()];
        let mut block_stack: Vec<usize> = Vec::new();
        let mut defined: HashSet<Variable> = HashSet::new();

        for (pc, instruction) in code.iter_indexed() {
            let descriptor = instruction.descriptor();

            let current_context = *context_stack
                .last()
                .expect("script-level context frame is never popped");
            if !current_context.contains(descriptor.requires) {
                return Err(ValidityError::ContextMismatch { pc });
            }

            for &variable in instruction.inputs() {
                if !defined.contains(&variable) {
                    return Err(ValidityError::UseBeforeDefinition { pc, variable });
                }
                if !variable.is_global() && !scope_stack.iter().any(|frame| frame.contains(&variable)) {
                    return Err(ValidityError::OutOfScopeUse { pc, variable });
                }
            }

            if descriptor.flags.contains(InstructionFlags::IS_BLOCK_END) {
                if block_stack.pop().is_none() {
                    return Err(ValidityError::UnbalancedBlock { pc });
                }
                scope_stack.pop();
                context_stack.pop();
            }

            for &variable in instruction.outputs() {
                Self::define(&mut defined, &mut scope_stack, pc, variable)?;
            }

            if descriptor.flags.contains(InstructionFlags::IS_BLOCK_START) {
                let surrounding = *context_stack.last().unwrap();
                let propagates = descriptor
                    .flags
                    .contains(InstructionFlags::PROPAGATES_SURROUNDING_CONTEXT);
                let opened = descriptor.opens | if propagates { surrounding } else { Context::empty() };
                context_stack.push(opened);
                scope_stack.push(HashSet::new());
                block_stack.push(pc);
            }

            for &variable in instruction.inner_outputs() {
                Self::define(&mut defined, &mut scope_stack, pc, variable)?;
            }
        }

        if !block_stack.is_empty() {
            return Err(ValidityError::UnbalancedBlock {
                pc: code.len().saturating_sub(1),
            });
        }

        Ok(())
    }

    fn define(
        defined: &mut HashSet<Variable>,
        scope_stack: &mut [HashSet<Variable>],
        pc: usize,
        variable: Variable,
    ) -> Result<(), ValidityError> {
        if variable.number() >= MAX_VARIABLES {
            return Err(ValidityError::VariableLimitExceeded { pc, variable });
        }
        if !defined.insert(variable) {
            return Err(ValidityError::DuplicateOutput { pc, variable });
        }
        scope_stack
            .last_mut()
            .expect("at least the script-level frame always exists")
            .insert(variable);
        Ok(())
    }
}
