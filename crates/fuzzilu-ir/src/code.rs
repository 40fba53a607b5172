use crate::instruction::Instruction;

/// An ordered instruction sequence. Validity (§4.3) is checked
/// separately by [`crate::validator::Validator`]; `Code` itself is just
/// the sequence plus convenience accessors used throughout analysis,
/// the builder, and the splicer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Code {
    instructions: Vec<Instruction>,
}

impl Code {
    pub fn new() -> Self {
        Code {
            instructions: Vec::new(),
        }
    }

    pub fn push(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &Instruction)> {
        self.instructions.iter().enumerate()
    }

    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_vec(self) -> Vec<Instruction> {
        self.instructions
    }
}

impl From<Vec<Instruction>> for Code {
    fn from(instructions: Vec<Instruction>) -> Self {
        Code { instructions }
    }
}

impl FromIterator<Instruction> for Code {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Code {
            instructions: iter.into_iter().collect(),
        }
    }
}
