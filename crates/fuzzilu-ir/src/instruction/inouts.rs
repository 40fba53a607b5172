use crate::variable::Variable;

/// The variable operands of an instruction, laid out as
/// `inputs | outputs | innerOutputs | [index]`. `index` is an optional
/// trailing constant-pool/operation-cache slot used by the serializer;
/// the IR engine itself never interprets it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Inouts {
    numbers: Vec<Variable>,
    num_inputs: usize,
    num_outputs: usize,
    num_inner_outputs: usize,
}

impl Inouts {
    pub fn new(
        inputs: Vec<Variable>,
        outputs: Vec<Variable>,
        inner_outputs: Vec<Variable>,
    ) -> Self {
        let num_inputs = inputs.len();
        let num_outputs = outputs.len();
        let num_inner_outputs = inner_outputs.len();
        let mut numbers = inputs;
        numbers.extend(outputs);
        numbers.extend(inner_outputs);
        Inouts {
            numbers,
            num_inputs,
            num_outputs,
            num_inner_outputs,
        }
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.numbers[0..self.num_inputs]
    }

    pub fn outputs(&self) -> &[Variable] {
        &self.numbers[self.num_inputs..self.num_inputs + self.num_outputs]
    }

    pub fn inner_outputs(&self) -> &[Variable] {
        let start = self.num_inputs + self.num_outputs;
        &self.numbers[start..start + self.num_inner_outputs]
    }

    /// All outputs this instruction defines: regular plus inner.
    pub fn all_outputs(&self) -> impl Iterator<Item = Variable> + '_ {
        self.outputs().iter().copied().chain(self.inner_outputs().iter().copied())
    }

    pub fn all_variables(&self) -> &[Variable] {
        &self.numbers
    }
}
