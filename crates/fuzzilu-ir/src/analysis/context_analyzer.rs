use crate::context::Context;
use crate::instruction::{Instruction, InstructionFlags};

/// Forward pass tracking the context stack: pushes `contextOpened ∪
/// (surrounding if propagates else ∅)` on block start, pops on block
/// end. Consumed one instruction at a time by the builder (to know
/// which generators are eligible) and the splicer (to know what the
/// host's current context is at the insertion point).
#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    stack: Vec<Context>,
}

impl Default for ContextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextAnalyzer {
    pub fn new() -> Self {
        ContextAnalyzer {
            stack: vec![Context::script()],
        }
    }

    pub fn current(&self) -> Context {
        *self.stack.last().expect("script frame is never popped")
    }

    pub fn step(&mut self, instruction: &Instruction) {
        let descriptor = instruction.descriptor();
        if descriptor.flags.contains(InstructionFlags::IS_BLOCK_END) {
            self.stack.pop();
        }
        if descriptor.flags.contains(InstructionFlags::IS_BLOCK_START) {
            let surrounding = self.current();
            let propagates = descriptor
                .flags
                .contains(InstructionFlags::PROPAGATES_SURROUNDING_CONTEXT);
            let opened = descriptor.opens | if propagates { surrounding } else { Context::empty() };
            self.stack.push(opened);
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
