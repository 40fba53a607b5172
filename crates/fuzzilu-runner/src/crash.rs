//! Crash classification (§4.11): a nonzero signal byte in an execution's
//! status word marks a crash, but a single crashing run doesn't say
//! whether the bug is deterministic or an artifact of scheduling/memory
//! layout. [`classify_crash`] re-executes the same script once with a
//! doubled timeout and compares outcomes to tell the two apart, and
//! reports the coverage edges hit at crash time as the signature callers
//! dedupe crashes by.

use std::time::Duration;

use crate::protocol::ExecutionStatus;
use crate::reprl::Reprl;
use crate::RunnerError;

/// Whether a crash reproduced on re-execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashClassification {
    /// The same signal reproduced on re-execution; safe to treat as a
    /// stable, reportable bug.
    Deterministic,
    /// Re-execution didn't crash the same way (or at all, or hung) —
    /// most likely a data race, use-after-free, or timing-dependent bug
    /// in the interpreter rather than something fuzzilu can minimize.
    Flaky,
}

/// A classified crash: the status it first crashed with, whether that
/// reproduced, and the coverage edges hit on the original run, used as
/// the uniqueness signature for dedup against previously-seen crashes.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub status: ExecutionStatus,
    pub classification: CrashClassification,
    pub signature: Vec<u32>,
}

impl CrashReport {
    pub fn is_deterministic(&self) -> bool {
        self.classification == CrashClassification::Deterministic
    }
}

/// Re-executes `script` once more with `timeout` doubled to classify a
/// crash the caller already observed with status `first_status`, using
/// the coverage bitmap still sitting from that first run as the
/// signature. `reprl` has already been respawned fresh by the caller's
/// prior [`Reprl::execute`] (crashes always trigger a respawn), so this
/// re-execution runs in a clean child exactly like the original did.
pub fn classify_crash(
    reprl: &mut Reprl,
    script: &[u8],
    timeout: Duration,
    first_status: ExecutionStatus,
) -> Result<CrashReport, RunnerError> {
    let signature = reprl.coverage().edges_hit();
    let doubled = timeout.saturating_mul(2);
    let outcome = reprl.execute(script, doubled)?;

    let classification = if !outcome.timed_out && outcome.status == first_status {
        CrashClassification::Deterministic
    } else {
        CrashClassification::Flaky
    };

    Ok(CrashReport { status: first_status, classification, signature })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_report_flags_as_such() {
        let report = CrashReport {
            status: ExecutionStatus { exit_code: 0, signal: 11 },
            classification: CrashClassification::Deterministic,
            signature: vec![1, 2, 3],
        };
        assert!(report.is_deterministic());
    }

    #[test]
    fn flaky_report_flags_as_such() {
        let report = CrashReport {
            status: ExecutionStatus { exit_code: 0, signal: 11 },
            classification: CrashClassification::Flaky,
            signature: vec![],
        };
        assert!(!report.is_deterministic());
    }
}
