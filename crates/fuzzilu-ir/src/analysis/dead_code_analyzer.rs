use crate::instruction::{Instruction, InstructionFlags};

/// Tracks unreachable code following an unconditional jump (`Return`,
/// `LoopBreak`, `Goto`) with a single depth counter. A block opened
/// while already dead bumps the counter again, so liveness resumes only
/// once the matching block end is reached — this lets one integer
/// handle arbitrarily nested dead regions without a stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadCodeAnalyzer {
    depth: u32,
}

impl DeadCodeAnalyzer {
    pub fn new() -> Self {
        DeadCodeAnalyzer { depth: 0 }
    }

    pub fn currently_dead(&self) -> bool {
        self.depth > 0
    }

    pub fn step(&mut self, instruction: &Instruction) {
        let descriptor = instruction.descriptor();
        if descriptor.flags.contains(InstructionFlags::IS_BLOCK_END) && self.depth > 0 {
            self.depth -= 1;
        }
        if descriptor.flags.contains(InstructionFlags::IS_JUMP) {
            self.depth += 1;
        } else if descriptor.flags.contains(InstructionFlags::IS_BLOCK_START) && self.depth > 0 {
            self.depth += 1;
        }
    }
}
