use ahash::AHashMap as HashMap;

use crate::instruction::Instruction;
use crate::variable::Variable;

#[derive(Debug, Clone, Default)]
struct DefUseInfo {
    definition: usize,
    uses: Vec<usize>,
}

/// Records the defining index and every use index of each variable.
/// Must be [`DefUseAnalyzer::finalize`]d before any query is made — the
/// builder runs it to completion over a candidate program before asking
/// whether a variable is dead (no recorded uses) or where it was last
/// touched.
#[derive(Debug, Clone, Default)]
pub struct DefUseAnalyzer {
    info: HashMap<Variable, DefUseInfo>,
    finalized: bool,
}

impl DefUseAnalyzer {
    pub fn new() -> Self {
        DefUseAnalyzer::default()
    }

    pub fn step(&mut self, pc: usize, instruction: &Instruction) {
        debug_assert!(!self.finalized, "DefUseAnalyzer stepped after finalize");
        for &variable in instruction.inputs() {
            self.info
                .entry(variable)
                .or_insert_with(|| DefUseInfo { definition: pc, uses: Vec::new() })
                .uses
                .push(pc);
        }
        for &variable in instruction.outputs().iter().chain(instruction.inner_outputs()) {
            self.info.entry(variable).or_default().definition = pc;
        }
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn definition_of(&self, variable: Variable) -> Option<usize> {
        assert!(self.finalized, "DefUseAnalyzer queried before finalize");
        self.info.get(&variable).map(|info| info.definition)
    }

    pub fn uses_of(&self, variable: Variable) -> &[usize] {
        assert!(self.finalized, "DefUseAnalyzer queried before finalize");
        self.info
            .get(&variable)
            .map(|info| info.uses.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_used(&self, variable: Variable) -> bool {
        !self.uses_of(variable).is_empty()
    }
}
