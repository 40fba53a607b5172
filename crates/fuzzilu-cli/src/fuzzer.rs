//! The single cooperative serial executor (§5): one `Fuzzer` owns its
//! builder environment, mutator pool, corpus, coverage evaluator, and
//! REPRL runner, and drives them all from one thread. `--jobs=N>1`
//! multiplies this struct across OS threads in [`crate::worker`]
//! instead of making any of it internally concurrent.

use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use fuzzilu_corpus::Corpus;
use fuzzilu_ir::builder::{BuildMode, GeneratorTable, ProgramBuilder};
use fuzzilu_ir::{lift, serialize_program, Environment, Program};
use fuzzilu_mutators::MutatorTable;
use fuzzilu_runner::{classify_crash, compute_aspect_intersection, CrashClassification, Evaluator, Reprl};

use crate::config::FuzzerConfig;
use crate::events::{FuzzerEvent, StatKind};
use crate::storage::StorageLayout;

/// Minimum and maximum corpus size (§4.10's "capacity window \[minSize,
/// maxSize\]"). Not given a concrete default in spec.md; chosen here to
/// match Fuzzilli's own defaults, see DESIGN.md.
pub const DEFAULT_MIN_CORPUS_SIZE: usize = 1000;
pub const DEFAULT_MAX_CORPUS_SIZE: usize = 10_000;

/// Instruction budget for a freshly generated (non-spliced) seed
/// program. Not specified by spec.md; see DESIGN.md.
const FRESH_PROGRAM_BUDGET: u32 = 100;

/// Per-execution REPRL timeout. Not specified by spec.md; see DESIGN.md.
const EXECUTION_TIMEOUT: Duration = Duration::from_millis(1000);

/// How `Fuzzer::run` concluded — drives the process exit code (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Normal,
    UserStopped,
    CrashFound,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    executions: u64,
    timeouts: u64,
    execution_failures: u64,
    flaky_aspects_discarded: u64,
    crashes_found: u64,
}

pub struct Fuzzer {
    environment: Environment,
    builder_generators: GeneratorTable,
    mutators: MutatorTable,
    corpus: Corpus,
    evaluator: Evaluator,
    reprl: Reprl,
    storage: StorageLayout,
    config: FuzzerConfig,
    events: Sender<FuzzerEvent>,
    counters: Counters,
    started_at: Instant,
    last_status_at: Instant,
    last_stats_export_at: Instant,
    /// Other workers' inboxes (`--jobs>1`, §5): every stable interesting
    /// program this worker finds gets broadcast here as serialized bytes.
    peers: Vec<Sender<Vec<u8>>>,
    /// This worker's own inbox, drained once per main-loop iteration.
    inbox: Option<Receiver<Vec<u8>>>,
}

impl Fuzzer {
    pub fn new(config: FuzzerConfig, storage: StorageLayout, events: Sender<FuzzerEvent>) -> anyhow::Result<Self> {
        Self::with_corpus_bounds(config, storage, events, DEFAULT_MIN_CORPUS_SIZE, DEFAULT_MAX_CORPUS_SIZE)
    }

    /// As [`Fuzzer::new`] but with an explicit corpus capacity window,
    /// so tests can exercise the bootstrap phase without waiting for
    /// [`DEFAULT_MIN_CORPUS_SIZE`] real executions.
    pub fn with_corpus_bounds(
        config: FuzzerConfig,
        storage: StorageLayout,
        events: Sender<FuzzerEvent>,
        min_corpus_size: usize,
        max_corpus_size: usize,
    ) -> anyhow::Result<Self> {
        let environment = Environment::lua_stdlib();

        let mut builder_generators = GeneratorTable::lua_default();
        let mutator_generators = GeneratorTable::lua_default();
        let mut mutators = MutatorTable::lua_default(mutator_generators);
        if config.swarm_testing {
            builder_generators.randomize_weights();
            mutators.randomize_weights();
        }

        let mut corpus = Corpus::new(min_corpus_size, max_corpus_size);
        if config.resume {
            let imported = corpus.import_from(&storage.old_corpus_dir)?;
            tracing::info!(imported, path = %storage.old_corpus_dir.display(), "resumed corpus from disk");
        }
        if config.debug {
            let imported = corpus.import_from(&storage.corpus_dir)?;
            tracing::info!(imported, path = %storage.corpus_dir.display(), "loaded corpus for replay");
        }

        let reprl = Reprl::spawn(&config.interpreter, &[])?;

        Ok(Fuzzer {
            environment,
            builder_generators,
            mutators,
            corpus,
            evaluator: Evaluator::new(),
            reprl,
            storage,
            config,
            events,
            counters: Counters::default(),
            started_at: Instant::now(),
            last_status_at: Instant::now(),
            last_stats_export_at: Instant::now(),
            peers: Vec::new(),
            inbox: None,
        })
    }

    /// Wires this fuzzer into a `--jobs>1` broadcast group: `peers` are
    /// the other workers' inboxes, `inbox` is this worker's own.
    pub fn set_peers(&mut self, peers: Vec<Sender<Vec<u8>>>, inbox: Receiver<Vec<u8>>) {
        self.peers = peers;
        self.inbox = Some(inbox);
    }

    /// Grows the corpus up to `minSize` with freshly generated programs
    /// before mutation-driven evolution begins, mirroring `buildPrefix`
    /// then `build` at the builder level but applied at the corpus
    /// level: keep seeding until there's something to splice from.
    pub fn bootstrap(&mut self) -> anyhow::Result<()> {
        while self.corpus.is_below_min_size() && !crate::signals::shutdown_requested() {
            let program = self.generate_fresh_program();
            self.fuzz_one(&program)?;
        }
        Ok(())
    }

    /// `--debug` (§6): replays every program already on disk under
    /// `corpus/` instead of generating or mutating anything, logging the
    /// coverage edges each one contributes. Finishes normally once the
    /// whole corpus has been replayed once.
    pub fn run_debug(&mut self) -> anyhow::Result<ExitOutcome> {
        let ids: Vec<fuzzilu_ir::ProgramId> = self.corpus.iter().map(|program| program.id()).collect();
        for id in ids {
            if crate::signals::shutdown_requested() {
                return Ok(ExitOutcome::UserStopped);
            }
            let Some(program) = self.corpus.get(id).cloned() else { continue };
            let before = self.evaluator.edges_found();
            self.fuzz_one(&program)?;
            let after = self.evaluator.edges_found();
            tracing::info!(program_id = %id, new_edges = after - before, total_edges = after, "replayed");
        }
        Ok(ExitOutcome::Normal)
    }

    pub fn run(&mut self) -> anyhow::Result<ExitOutcome> {
        self.bootstrap()?;

        loop {
            if crate::signals::shutdown_requested() {
                self.events.send(FuzzerEvent::Shutdown { user_initiated: true }).ok();
                return Ok(ExitOutcome::UserStopped);
            }

            self.maybe_print_status();
            self.maybe_export_stats();
            self.drain_peer_programs();

            if self.corpus.is_below_min_size() {
                let program = self.generate_fresh_program();
                if self.fuzz_one(&program)?.is_crash() {
                    return Ok(ExitOutcome::CrashFound);
                }
                continue;
            }

            let Some(parent_id) = self.corpus.random_element_for_mutating() else {
                let program = self.generate_fresh_program();
                if self.fuzz_one(&program)?.is_crash() {
                    return Ok(ExitOutcome::CrashFound);
                }
                continue;
            };
            let Some(parent) = self.corpus.get(parent_id).cloned() else { continue };

            for _ in 0..self.config.consecutive_mutations {
                if crate::signals::shutdown_requested() {
                    break;
                }
                let Some(mutator) = self.mutators.pick() else { break };
                let mut rng = rand::thread_rng();
                let child = mutator.mutate(&mut rng, &self.environment, &parent, &self.corpus);
                let Some(child) = child else { continue };

                self.corpus.record_mutation(parent_id);
                if self.fuzz_one(&child)?.is_crash() {
                    return Ok(ExitOutcome::CrashFound);
                }
            }
        }
    }

    fn generate_fresh_program(&self) -> Program {
        let mut builder = ProgramBuilder::new(&self.environment);
        builder.build_prefix(&self.builder_generators);
        builder.build(FRESH_PROGRAM_BUDGET, BuildMode::Generating, &self.builder_generators, None);
        builder.finalize()
    }

    /// Runs one program through the REPRL transport and reacts to the
    /// outcome per the error taxonomy of spec.md §7.
    fn fuzz_one(&mut self, program: &Program) -> anyhow::Result<FuzzOneOutcome> {
        let program_id = program.id();
        self.events.send(FuzzerEvent::PreExecute { program_id }).ok();

        let script = lift(program).into_bytes();
        let outcome = self.reprl.execute(&script, EXECUTION_TIMEOUT)?;
        self.counters.executions += 1;
        self.events.send(FuzzerEvent::PostExecute { program_id, exit_code: outcome.status.exit_code }).ok();

        if outcome.timed_out {
            self.counters.timeouts += 1;
            self.events.send(FuzzerEvent::Stat(StatKind::ExecutionTimeout)).ok();
            return Ok(FuzzOneOutcome::Timeout);
        }

        if outcome.is_crash() {
            self.counters.crashes_found += 1;
            let report = classify_crash(&mut self.reprl, &script, EXECUTION_TIMEOUT, outcome.status)?;
            self.events
                .send(FuzzerEvent::CrashFound {
                    program_id,
                    classification: report.classification,
                    signature_len: report.signature.len(),
                })
                .ok();
            // A persistent REPRL child's stdout/stderr aren't captured
            // per execution (they're inherited, shared across every
            // round-trip) — the footer notes that rather than guessing.
            self.storage.write_crash(
                program_id,
                program,
                &report,
                &[],
                "(not captured: REPRL child inherits stdout)",
                "(not captured: REPRL child inherits stderr)",
                EXECUTION_TIMEOUT,
            )?;
            return Ok(FuzzOneOutcome::Crashed(report.classification));
        }

        if outcome.status.exit_code != 0 {
            self.counters.execution_failures += 1;
            self.events
                .send(FuzzerEvent::Stat(StatKind::ExecutionFailure { exit_code: outcome.status.exit_code }))
                .ok();
            return Ok(FuzzOneOutcome::Failed);
        }

        let aspects = self.evaluator.aspects_of(self.reprl.coverage());
        if aspects.is_empty() {
            return Ok(FuzzOneOutcome::NotInteresting);
        }

        let reprl = &mut self.reprl;
        let stable = compute_aspect_intersection::<_, anyhow::Error>(&aspects, || {
            let retry = reprl.execute(&script, EXECUTION_TIMEOUT)?;
            if retry.timed_out {
                Ok(Vec::new())
            } else {
                Ok(reprl.coverage().edges_hit())
            }
        })?;

        match stable {
            Some(stable) if !stable.is_empty() => {
                self.evaluator.commit(&stable);
                let id = self.corpus.add(program.clone());
                self.events
                    .send(FuzzerEvent::InterestingProgramFound { program_id: id, new_edges: stable.edges.len() })
                    .ok();
                self.maybe_export_corpus()?;
                self.broadcast_to_peers(program);
                Ok(FuzzOneOutcome::Interesting)
            }
            _ => {
                self.counters.flaky_aspects_discarded += 1;
                self.events.send(FuzzerEvent::Stat(StatKind::FlakyAspects)).ok();
                Ok(FuzzOneOutcome::NotInteresting)
            }
        }
    }

    fn maybe_export_corpus(&mut self) -> anyhow::Result<()> {
        let written = self.corpus.export_new_to(&self.storage.corpus_dir)?;
        if written > 0 {
            tracing::debug!(written, "exported new corpus entries");
        }
        Ok(())
    }

    fn maybe_print_status(&mut self) {
        const STATUS_INTERVAL: Duration = Duration::from_secs(5);
        if self.last_status_at.elapsed() < STATUS_INTERVAL {
            return;
        }
        self.last_status_at = Instant::now();
        let elapsed = self.started_at.elapsed().as_secs_f64().max(1.0);
        tracing::info!(
            executions = self.counters.executions,
            executions_per_second = self.counters.executions as f64 / elapsed,
            corpus_size = self.corpus.len(),
            coverage_edges = self.evaluator.edges_found(),
            crashes_found = self.counters.crashes_found,
            "status"
        );
    }

    /// Writes a `stats/stats-<timestamp>.json` snapshot on the interval
    /// configured by `--statisticsExportInterval`, gated on
    /// `--exportStatistics` (§6).
    fn maybe_export_stats(&mut self) {
        let Some(interval) = self.config.statistics_export_interval else { return };
        if !self.config.export_statistics || self.last_stats_export_at.elapsed() < interval {
            return;
        }
        self.last_stats_export_at = Instant::now();

        let unix_millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        let snapshot = self.snapshot_stats();
        match snapshot.write(&self.storage.stats_dir, unix_millis) {
            Ok(path) => tracing::debug!(path = %path.display(), "exported statistics snapshot"),
            Err(error) => tracing::warn!(%error, "failed to export statistics snapshot"),
        }
    }

    pub fn snapshot_stats(&self) -> crate::storage::StatsSnapshot {
        let elapsed = self.started_at.elapsed().as_secs_f64().max(1.0);
        crate::storage::StatsSnapshot {
            executions: self.counters.executions,
            executions_per_second: self.counters.executions as f64 / elapsed,
            corpus_size: self.corpus.len(),
            coverage_edges: self.evaluator.edges_found(),
            crashes_found: self.counters.crashes_found as usize,
            timeouts: self.counters.timeouts,
            execution_failures: self.counters.execution_failures,
            flaky_aspects_discarded: self.counters.flaky_aspects_discarded,
        }
    }

    fn broadcast_to_peers(&self, program: &Program) {
        if self.peers.is_empty() {
            return;
        }
        let bytes = serialize_program(program);
        for peer in &self.peers {
            peer.send(bytes.clone()).ok();
        }
    }

    /// Re-executes and re-evaluates every program a peer worker has
    /// broadcast since the last drain (§5 "exported interesting programs
    /// are re-executed and re-evaluated by the recipient") before
    /// admitting any of them to this fuzzer's own corpus.
    fn drain_peer_programs(&mut self) {
        let Some(inbox) = self.inbox.as_ref() else { return };
        let pending: Vec<Vec<u8>> = inbox.try_iter().take(MAX_PEER_PROGRAMS_PER_DRAIN).collect();
        for bytes in pending {
            match fuzzilu_ir::deserialize_program(&bytes) {
                Ok(program) => {
                    if let Err(error) = self.fuzz_one(&program) {
                        tracing::warn!(%error, "re-evaluating a peer program failed");
                    }
                }
                Err(error) => tracing::warn!(%error, "dropping undecodable program from a peer"),
            }
        }
    }

}

/// How many peer broadcasts a worker drains per main-loop iteration, so
/// a burst from one very productive peer can't starve local fuzzing.
const MAX_PEER_PROGRAMS_PER_DRAIN: usize = 16;

enum FuzzOneOutcome {
    Interesting,
    NotInteresting,
    Failed,
    Timeout,
    Crashed(CrashClassification),
}

impl FuzzOneOutcome {
    fn is_crash(&self) -> bool {
        matches!(self, FuzzOneOutcome::Crashed(_))
    }
}
