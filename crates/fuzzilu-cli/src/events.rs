//! The fuzz loop's event bus (§5): every externally-visible occurrence
//! during a run is one of these, delivered in FIFO order to whatever is
//! listening — today that's just the stats/status sink in
//! [`crate::fuzzer`], but the type exists independently so a future
//! listener (a TUI, a remote dashboard) can subscribe without touching
//! the loop itself.

use fuzzilu_ir::ProgramId;
use fuzzilu_runner::CrashClassification;

/// Recoverable conditions that don't warrant their own event variant —
/// folded into [`FuzzerEvent::Stat`] per spec.md §7's "funneled to the
/// event bus as statistics" propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Execution timeout (§7): sample skipped, runner may have respawned.
    ExecutionTimeout,
    /// Non-zero exit without a signal: recorded, not otherwise acted on.
    ExecutionFailure { exit_code: u8 },
    /// `compute_aspect_intersection` never stabilized within the
    /// attempt budget: the candidate is discarded.
    FlakyAspects,
    /// A `.fzil` file in an imported corpus directory failed to parse;
    /// the file is skipped, not fatal to the import as a whole.
    CorpusImportDecodeFailure,
}

#[derive(Debug, Clone)]
pub enum FuzzerEvent {
    PreExecute { program_id: ProgramId },
    PostExecute { program_id: ProgramId, exit_code: u8 },
    InterestingProgramFound { program_id: ProgramId, new_edges: usize },
    CrashFound { program_id: ProgramId, classification: CrashClassification, signature_len: usize },
    Stat(StatKind),
    Shutdown { user_initiated: bool },
}
