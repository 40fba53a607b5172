mod descriptor;
mod inouts;
mod operation;
pub mod operators;

pub use descriptor::OperationDescriptor;
pub use flags::InstructionFlags;
pub use inouts::Inouts;
pub use operation::Operation;

mod flags;

use crate::variable::Variable;

/// Immutable `(operation, inouts)` tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    operation: Operation,
    inouts: Inouts,
    /// Optional trailing constant/operation-cache index (§6).
    index: Option<u32>,
}

impl Instruction {
    pub fn new(operation: Operation, inouts: Inouts) -> Self {
        Instruction {
            operation,
            inouts,
            index: None,
        }
    }

    pub fn with_index(operation: Operation, inouts: Inouts, index: u32) -> Self {
        Instruction {
            operation,
            inouts,
            index: Some(index),
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn inouts(&self) -> &Inouts {
        &self.inouts
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn descriptor(&self) -> OperationDescriptor {
        self.operation.descriptor()
    }

    pub fn inputs(&self) -> &[Variable] {
        self.inouts.inputs()
    }

    pub fn outputs(&self) -> &[Variable] {
        self.inouts.outputs()
    }

    pub fn inner_outputs(&self) -> &[Variable] {
        self.inouts.inner_outputs()
    }

    pub fn is_pure(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_PURE)
    }

    pub fn is_mutable(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_MUTABLE)
    }

    pub fn is_variadic(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_VARIADIC)
    }

    pub fn is_call(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_CALL)
    }

    pub fn is_jump(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_JUMP)
    }

    pub fn is_block_start(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_BLOCK_START)
    }

    pub fn is_block_end(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_BLOCK_END)
    }

    pub fn is_internal(&self) -> bool {
        self.descriptor().flags.contains(InstructionFlags::IS_INTERNAL)
    }
}
