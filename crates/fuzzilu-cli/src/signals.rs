//! SIGINT/SIGTERM handling (§6, §9 "the per-process signal handlers ...
//! are the only true process-globals"): a single `AtomicBool` the fuzz
//! loop polls once per iteration, set from an async-signal-safe handler
//! that does nothing but the store itself.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_signal: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Installs the same handler for `SIGINT` and `SIGTERM`; both map to
/// `fuzzer.shutdown(userInitiated: true)` per spec.md §6.
pub fn install() -> Result<(), nix::Error> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let action = SigAction::new(SigHandler::Handler(handle_shutdown_signal), SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(Signal::SIGINT, &action)?;
        sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_out_not_requested() {
        assert!(!shutdown_requested());
    }
}
