//! REPRL process transport and coverage evaluator (§4.11): spawns the
//! target Lua interpreter once, drives it through repeated executions
//! over a small pipe-based wire protocol instead of a fork-per-program
//! restart, and turns its shared-memory coverage bitmap into aspects a
//! fuzzer instance can use to decide corpus inclusion.
//!
//! [`reprl::Reprl`] owns the transport and respawn policy;
//! [`coverage::CoverageMap`] and [`coverage::Evaluator`] own the
//! shared-memory region and the persistent found-edges mask;
//! [`crash::classify_crash`] re-executes a crashing script to separate
//! deterministic crashes from flaky ones and to compute a uniqueness
//! signature.

pub mod coverage;
pub mod crash;
pub mod protocol;
pub mod reprl;

pub use coverage::{compute_aspect_intersection, CoverageMap, Evaluator, ProgramAspects};
pub use crash::{classify_crash, CrashClassification, CrashReport};
pub use protocol::ExecutionStatus;
pub use reprl::{ExecutionOutcome, Reprl};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("i/o error talking to the interpreter child: {0}")]
    Io(#[from] std::io::Error),
    #[error("system call failed: {0}")]
    Errno(#[from] nix::Error),
    #[error("handshake failed: expected {expected:?}, got {actual:?}")]
    HandshakeMismatch { expected: Vec<u8>, actual: Vec<u8> },
    #[error("interpreter child exited before completing the handshake")]
    ChildExitedDuringHandshake,
}
