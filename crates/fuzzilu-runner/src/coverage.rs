//! Shared-memory coverage bitmap and the evaluator that turns it into
//! per-execution aspects and a persistent found-edges mask (§4.11).

use std::fs::File;
use std::os::fd::{AsFd, OwnedFd};

use ahash::AHashSet;
use memmap2::MmapMut;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use crate::protocol::SHM_SIZE;
use crate::RunnerError;

/// The shared region a paired interpreter child writes edge hits into.
/// Backed by a POSIX shared-memory object rather than an anonymous
/// mapping so the same underlying pages survive the child's `exec` —
/// it re-maps the fd the parent dup2's onto [`crate::protocol::CHILD_SHM_FD`]
/// itself, rather than inheriting an address-space mapping `exec` would
/// otherwise discard.
pub struct CoverageMap {
    mmap: MmapMut,
    /// Kept alive so the shared object isn't dropped out from under the
    /// mapping; duplicated into the child via `dup2` before `exec`.
    fd: OwnedFd,
}

impl CoverageMap {
    /// Creates a fresh, already-unlinked shared-memory region sized
    /// [`SHM_SIZE`]. Unlinking immediately (Fuzzilli's own convention)
    /// means the object is reachable only through fds already held by
    /// this process and whatever it dup2's onto the child — nothing
    /// else on the system can open it by name.
    pub fn create() -> Result<Self, RunnerError> {
        let name = format!("/fuzzilu-coverage-{}", std::process::id());
        let fd = shm_open(
            name.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )?;
        shm_unlink(name.as_str()).ok();
        ftruncate(&fd, SHM_SIZE as i64)?;

        // mmap through a cloned fd so `fd` itself stays free for `dup2`
        // into the child; `File` takes ownership of whatever it's given.
        let file = File::from(fd.try_clone()?);
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(CoverageMap { mmap, fd })
    }

    /// The raw fd to `dup2` onto [`crate::protocol::CHILD_SHM_FD`] in
    /// the spawned child, before `exec`.
    pub fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.fd.as_fd()
    }

    fn num_edges(&self) -> u32 {
        u32::from_le_bytes(self.mmap[0..4].try_into().expect("header is 4 bytes"))
    }

    fn bitmap(&self) -> &[u8] {
        let bytes = self.num_edges().div_ceil(8) as usize;
        &self.mmap[4..4 + bytes]
    }

    fn is_set(&self, edge: u32) -> bool {
        let bitmap = self.bitmap();
        let byte = (edge / 8) as usize;
        byte < bitmap.len() && bitmap[byte] & (1 << (edge % 8)) != 0
    }

    /// Every edge index currently marked hit. The child clears the
    /// bitmap itself after each execution (§4.11 step 5), so this
    /// reflects exactly the most recent run.
    pub fn edges_hit(&self) -> Vec<u32> {
        (0..self.num_edges()).filter(|&edge| self.is_set(edge)).collect()
    }
}

/// A set of newly-hit coverage edges — the fingerprint an interesting
/// program is admitted to the corpus under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAspects {
    pub edges: Vec<u32>,
}

impl ProgramAspects {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Owns the persistent "found edges" mask and turns a single execution's
/// raw bitmap into a [`ProgramAspects`] relative to it.
#[derive(Default)]
pub struct Evaluator {
    found: AHashSet<u32>,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator { found: AHashSet::new() }
    }

    pub fn edges_found(&self) -> usize {
        self.found.len()
    }

    /// Computes this execution's aspects against the persistent mask
    /// without committing them — callers decide whether to
    /// [`Evaluator::commit`] after confirming stability via
    /// [`compute_aspect_intersection`].
    pub fn aspects_of(&self, coverage: &CoverageMap) -> ProgramAspects {
        let edges = coverage.edges_hit().into_iter().filter(|edge| !self.found.contains(edge)).collect();
        ProgramAspects { edges }
    }

    /// Marks every edge in `aspects` as found, growing the persistent
    /// mask. Called once a program's aspects have been confirmed stable.
    pub fn commit(&mut self, aspects: &ProgramAspects) {
        self.found.extend(aspects.edges.iter().copied());
    }
}

/// Minimum and maximum number of re-executions `compute_aspect_intersection`
/// performs before giving up on stabilizing (§4.11, §8 invariant 11).
pub const MIN_ASPECT_INTERSECTION_ATTEMPTS: u32 = 5;
pub const MAX_ASPECT_INTERSECTION_ATTEMPTS: u32 = 50;

/// Re-executes `script` up to [`MAX_ASPECT_INTERSECTION_ATTEMPTS`] times
/// (never fewer than [`MIN_ASPECT_INTERSECTION_ATTEMPTS`]), intersecting
/// `initial`'s edge set against each re-execution's hits. Returns the
/// stable intersection, or `None` if it ever collapses to empty before
/// the minimum attempt count is reached (flaky, per §4.11).
///
/// `execute_once` runs the script once and returns the raw edge hits for
/// that run; kept generic over the caller's REPRL transport so this
/// function stays pure with respect to process management.
pub fn compute_aspect_intersection<F, E>(
    initial: &ProgramAspects,
    mut execute_once: F,
) -> Result<Option<ProgramAspects>, E>
where
    F: FnMut() -> Result<Vec<u32>, E>,
{
    let mut current: AHashSet<u32> = initial.edges.iter().copied().collect();
    if current.is_empty() {
        return Ok(Some(ProgramAspects { edges: Vec::new() }));
    }

    for attempt in 1..=MAX_ASPECT_INTERSECTION_ATTEMPTS {
        let hit: AHashSet<u32> = execute_once()?.into_iter().collect();
        current = current.intersection(&hit).copied().collect();

        if current.is_empty() {
            if attempt < MIN_ASPECT_INTERSECTION_ATTEMPTS {
                continue;
            }
            return Ok(None);
        }
        if attempt >= MIN_ASPECT_INTERSECTION_ATTEMPTS {
            break;
        }
    }

    if current.is_empty() {
        Ok(None)
    } else {
        let mut edges: Vec<u32> = current.into_iter().collect();
        edges.sort_unstable();
        Ok(Some(ProgramAspects { edges }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspects_of_excludes_already_found_edges() {
        let mut evaluator = Evaluator::new();
        evaluator.commit(&ProgramAspects { edges: vec![1, 2] });
        assert_eq!(evaluator.edges_found(), 2);
    }

    #[test]
    fn intersection_stabilizes_on_consistent_hits() {
        let initial = ProgramAspects { edges: vec![1, 2, 3] };
        let result: Result<Option<ProgramAspects>, ()> =
            compute_aspect_intersection(&initial, || Ok(vec![1, 2, 3, 99]));
        let stable = result.unwrap().unwrap();
        assert_eq!(stable.edges, vec![1, 2, 3]);
    }

    #[test]
    fn intersection_discards_flaky_aspects() {
        let initial = ProgramAspects { edges: vec![1, 2] };
        let mut call = 0;
        let result: Result<Option<ProgramAspects>, ()> = compute_aspect_intersection(&initial, || {
            call += 1;
            // only ever re-hits edge 1, never edge 2: intersection empties
            Ok(vec![1])
        });
        assert!(result.unwrap().is_none());
        assert!(call >= MIN_ASPECT_INTERSECTION_ATTEMPTS as usize);
    }

    #[test]
    fn empty_initial_aspects_short_circuit() {
        let initial = ProgramAspects { edges: vec![] };
        let result: Result<Option<ProgramAspects>, ()> = compute_aspect_intersection(&initial, || Ok(vec![1, 2]));
        assert_eq!(result.unwrap().unwrap().edges, Vec::<u32>::new());
    }
}
