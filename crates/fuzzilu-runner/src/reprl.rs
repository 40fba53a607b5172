//! The REPRL transport itself: spawning the interpreter, performing the
//! handshake, running one script per round-trip, and the respawn policy
//! that recycles the child after too many executions or a crash/hang
//! (§4.11).

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use nix::sys::select::{select, FdSet};
use nix::sys::signal::{self, Signal};
use nix::sys::time::{TimeVal, TimeValLike};
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::{dup2, Pid};

use crate::coverage::CoverageMap;
use crate::protocol::{
    ExecutionStatus, CEXE, CHILD_CONTROL_IN_FD, CHILD_CONTROL_OUT_FD, CHILD_DATA_IN_FD, CHILD_SHM_FD,
    DEFAULT_RESPAWN_INTERVAL, HELO,
};
use crate::RunnerError;

/// Result of one `execute` round-trip: the decoded status word plus
/// whether the runner had to declare a timeout (in which case the
/// child has already been killed and respawned by the time this
/// returns).
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub timed_out: bool,
}

impl ExecutionOutcome {
    pub fn is_crash(&self) -> bool {
        !self.timed_out && self.status.is_crash()
    }
}

struct ParentPipes {
    control_write: File,
    control_read: File,
    data_write: File,
}

fn spawn_child(interpreter: &Path, args: &[String], coverage: &CoverageMap) -> Result<(Child, ParentPipes), RunnerError> {
    let (child_control_in, parent_control_write) = pipe()?;
    let (parent_control_read, child_control_out) = pipe()?;
    let (child_data_in, parent_data_write) = pipe()?;

    let child_control_in_fd = child_control_in.as_raw_fd();
    let child_control_out_fd = child_control_out.as_raw_fd();
    let child_data_in_fd = child_data_in.as_raw_fd();
    let child_shm_fd = coverage.as_fd().as_raw_fd();

    let mut command = Command::new(interpreter);
    command.args(args).stdin(Stdio::null()).stdout(Stdio::inherit()).stderr(Stdio::inherit());

    unsafe {
        command.pre_exec(move || {
            dup2(child_control_in_fd, CHILD_CONTROL_IN_FD)?;
            dup2(child_control_out_fd, CHILD_CONTROL_OUT_FD)?;
            dup2(child_data_in_fd, CHILD_DATA_IN_FD)?;
            dup2(child_shm_fd, CHILD_SHM_FD)?;
            Ok(())
        });
    }

    let child = command.spawn()?;

    // The child has its own copies (post-fork, pre-dup2/exec); the
    // parent doesn't need these ends once the child is running.
    drop(child_control_in);
    drop(child_control_out);
    drop(child_data_in);

    Ok((
        child,
        ParentPipes {
            control_write: File::from(parent_control_write),
            control_read: File::from(parent_control_read),
            data_write: File::from(parent_data_write),
        },
    ))
}

fn pipe() -> Result<(OwnedFd, OwnedFd), RunnerError> {
    nix::unistd::pipe().map_err(RunnerError::from)
}

/// Drives a single persistent interpreter child through the REPRL wire
/// protocol. Not shared across threads — a fuzzer instance owns exactly
/// one `Reprl` per worker, matching §5's "own executor, own runner"
/// model.
pub struct Reprl {
    interpreter: PathBuf,
    args: Vec<String>,
    child: Child,
    control_write: File,
    control_read: File,
    data_write: File,
    coverage: CoverageMap,
    executions_since_spawn: u32,
    respawn_interval: u32,
}

impl Reprl {
    /// Spawns `interpreter`, wires the REPRL fds via `pre_exec`, and
    /// performs the `HELO` handshake.
    pub fn spawn(interpreter: impl AsRef<Path>, args: &[String]) -> Result<Self, RunnerError> {
        Self::spawn_with_respawn_interval(interpreter, args, DEFAULT_RESPAWN_INTERVAL)
    }

    pub fn spawn_with_respawn_interval(
        interpreter: impl AsRef<Path>,
        args: &[String],
        respawn_interval: u32,
    ) -> Result<Self, RunnerError> {
        let interpreter = interpreter.as_ref().to_path_buf();
        let coverage = CoverageMap::create()?;
        let (child, pipes) = spawn_child(&interpreter, args, &coverage)?;

        let mut reprl = Reprl {
            interpreter,
            args: args.to_vec(),
            child,
            control_write: pipes.control_write,
            control_read: pipes.control_read,
            data_write: pipes.data_write,
            coverage,
            executions_since_spawn: 0,
            respawn_interval,
        };
        reprl.handshake()?;
        Ok(reprl)
    }

    fn handshake(&mut self) -> Result<(), RunnerError> {
        self.control_write.write_all(HELO)?;
        let mut echoed = [0u8; 4];
        self.control_read.read_exact(&mut echoed).map_err(|_| RunnerError::ChildExitedDuringHandshake)?;
        if &echoed != HELO {
            return Err(RunnerError::HandshakeMismatch {
                expected: HELO.to_vec(),
                actual: echoed.to_vec(),
            });
        }
        Ok(())
    }

    pub fn coverage(&self) -> &CoverageMap {
        &self.coverage
    }

    /// Runs `script` once. On timeout, kills the stuck child, respawns,
    /// and returns an outcome with `timed_out: true` rather than an
    /// error — a hang is an expected, handle-able event in the fuzz
    /// loop, not an exceptional one.
    pub fn execute(&mut self, script: &[u8], timeout: Duration) -> Result<ExecutionOutcome, RunnerError> {
        self.control_write.write_all(CEXE)?;
        self.control_write.write_all(&(script.len() as u64).to_le_bytes())?;
        self.data_write.write_all(script)?;

        match self.wait_for_status(timeout)? {
            Some(word) => {
                self.executions_since_spawn += 1;
                let status = ExecutionStatus::from_word(word);
                if self.executions_since_spawn >= self.respawn_interval || status.is_crash() {
                    self.respawn()?;
                }
                Ok(ExecutionOutcome { status, timed_out: false })
            }
            None => {
                self.kill_and_wait();
                self.respawn()?;
                Ok(ExecutionOutcome {
                    status: ExecutionStatus { exit_code: 0, signal: 0 },
                    timed_out: true,
                })
            }
        }
    }

    fn wait_for_status(&mut self, timeout: Duration) -> Result<Option<u32>, RunnerError> {
        let raw = self.control_read.as_raw_fd();
        let mut read_fds = FdSet::new();
        read_fds.insert(raw);
        let mut tv = TimeVal::milliseconds(timeout.as_millis() as i64);
        let ready = select(Some(raw + 1), Some(&mut read_fds), None, None, Some(&mut tv))?;
        if ready == 0 {
            return Ok(None);
        }
        let mut word = [0u8; 4];
        self.control_read.read_exact(&mut word)?;
        Ok(Some(u32::from_le_bytes(word)))
    }

    fn kill_and_wait(&mut self) {
        let pid = Pid::from_raw(self.child.id() as i32);
        signal::kill(pid, Signal::SIGKILL).ok();
        waitpid(pid, Some(WaitPidFlag::empty())).ok();
    }

    /// Kills the current child (if still alive) and spawns a fresh one,
    /// redoing the handshake — the respawn policy of §4.11.
    pub fn respawn(&mut self) -> Result<(), RunnerError> {
        if self.child.try_wait().ok().flatten().is_none() {
            self.kill_and_wait();
        }
        self.coverage = CoverageMap::create()?;
        let (child, pipes) = spawn_child(&self.interpreter, &self.args, &self.coverage)?;
        self.child = child;
        self.control_write = pipes.control_write;
        self.control_read = pipes.control_read;
        self.data_write = pipes.data_write;
        self.executions_since_spawn = 0;
        self.handshake()
    }
}

impl Drop for Reprl {
    fn drop(&mut self) {
        if self.child.try_wait().ok().flatten().is_none() {
            self.kill_and_wait();
        }
    }
}
