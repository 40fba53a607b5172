//! On-disk persisted state layout (§6): `corpus/`, `crashes/`, `stats/`
//! under the configured storage path, plus `old_corpus/` as the
//! `--resume` import source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fuzzilu_ir::{serialize_program, Program, ProgramId};
use fuzzilu_runner::{CrashClassification, CrashReport};
use serde::Serialize;

use crate::config::FuzzerConfig;

#[derive(Clone)]
pub struct StorageLayout {
    pub root: PathBuf,
    pub corpus_dir: PathBuf,
    pub crashes_dir: PathBuf,
    pub stats_dir: PathBuf,
    pub old_corpus_dir: PathBuf,
}

impl StorageLayout {
    /// Creates (or, with `--overwrite`, recreates) the directory tree a
    /// run persists state under.
    pub fn prepare(config: &FuzzerConfig) -> io::Result<Self> {
        let root = config.storage_path.clone();
        if config.overwrite && root.exists() {
            fs::remove_dir_all(&root)?;
        }

        let corpus_dir = root.join("corpus");
        let crashes_dir = root.join("crashes");
        let stats_dir = root.join("stats");
        let old_corpus_dir = root.join("old_corpus");

        fs::create_dir_all(&corpus_dir)?;
        fs::create_dir_all(&crashes_dir)?;
        fs::create_dir_all(&stats_dir)?;

        Ok(StorageLayout { root, corpus_dir, crashes_dir, stats_dir, old_corpus_dir })
    }

    /// A per-worker view onto the same run (`--jobs>1`): each worker gets
    /// its own `corpus/worker-<index>` subtree so concurrent exports
    /// never race on the same filenames, while `crashes/` and `stats/`
    /// stay shared since every crash and stats file already carries a
    /// unique id or timestamp.
    pub fn worker_view(&self, index: usize) -> io::Result<Self> {
        let corpus_dir = self.corpus_dir.join(format!("worker-{index}"));
        fs::create_dir_all(&corpus_dir)?;
        Ok(StorageLayout {
            root: self.root.clone(),
            corpus_dir,
            crashes_dir: self.crashes_dir.clone(),
            stats_dir: self.stats_dir.clone(),
            old_corpus_dir: self.old_corpus_dir.clone(),
        })
    }

    /// Writes a crashing program to `crashes/<id>.fzil`, appending a
    /// `CRASH INFO` footer (signal, stdout/stderr, arguments,
    /// contributors, execution time) after the serialized program
    /// bytes — the parser for the tagged instruction stream reads
    /// exactly as many bytes as its own length-prefixed fields describe
    /// and never looks past them, so the footer coexists in the same
    /// file without needing a separate sidecar.
    pub fn write_crash(
        &self,
        id: ProgramId,
        program: &Program,
        report: &CrashReport,
        arguments: &[String],
        stdout: &str,
        stderr: &str,
        execution_time: Duration,
    ) -> io::Result<PathBuf> {
        let mut bytes = serialize_program(program);
        bytes.extend_from_slice(b"\n-- CRASH INFO --\n");
        bytes.extend_from_slice(format!("signal: {}\n", report.status.signal).as_bytes());
        bytes.extend_from_slice(
            format!("deterministic: {}\n", report.classification == CrashClassification::Deterministic).as_bytes(),
        );
        bytes.extend_from_slice(format!("arguments: {:?}\n", arguments).as_bytes());
        bytes.extend_from_slice(format!("contributors: {:?}\n", program.contributors()).as_bytes());
        bytes.extend_from_slice(format!("execution_time_ms: {}\n", execution_time.as_millis()).as_bytes());
        bytes.extend_from_slice(b"-- stdout --\n");
        bytes.extend_from_slice(stdout.as_bytes());
        bytes.extend_from_slice(b"\n-- stderr --\n");
        bytes.extend_from_slice(stderr.as_bytes());

        let path = self.crashes_dir.join(format!("{id}.fzil"));
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// A periodic snapshot written to `stats/` (§6), one JSON file per
/// export, matching `luars_debugger`'s convention of structured data
/// crossing a process boundary as `serde_json` rather than ad-hoc text.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub executions: u64,
    pub executions_per_second: f64,
    pub corpus_size: usize,
    pub coverage_edges: usize,
    pub crashes_found: usize,
    pub timeouts: u64,
    pub execution_failures: u64,
    pub flaky_aspects_discarded: u64,
}

impl StatsSnapshot {
    /// Writes `stats/stats-<timestamp>.json`. The timestamp is supplied
    /// by the caller (rather than read here) so the export cadence
    /// stays driven by the fuzz loop's own clock, not a hidden one.
    pub fn write(&self, stats_dir: &Path, unix_millis: i64) -> io::Result<PathBuf> {
        let path = stats_dir.join(format!("stats-{unix_millis}.json"));
        let json = serde_json::to_vec_pretty(self).expect("StatsSnapshot always serializes");
        fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_creates_the_full_tree() {
        let dir = tempfile::tempdir().unwrap();
        let config = FuzzerConfig {
            interpreter: std::env::current_exe().unwrap(),
            jobs: 1,
            consecutive_mutations: 5,
            storage_path: dir.path().join("storage"),
            resume: false,
            overwrite: false,
            export_statistics: false,
            statistics_export_interval: None,
            swarm_testing: false,
            debug: false,
        };
        let layout = StorageLayout::prepare(&config).unwrap();
        assert!(layout.corpus_dir.is_dir());
        assert!(layout.crashes_dir.is_dir());
        assert!(layout.stats_dir.is_dir());
    }

    #[test]
    fn overwrite_clears_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let storage_path = dir.path().join("storage");
        fs::create_dir_all(storage_path.join("corpus")).unwrap();
        fs::write(storage_path.join("corpus").join("stale.fzil"), b"stale").unwrap();

        let config = FuzzerConfig {
            interpreter: std::env::current_exe().unwrap(),
            jobs: 1,
            consecutive_mutations: 5,
            storage_path: storage_path.clone(),
            resume: false,
            overwrite: true,
            export_statistics: false,
            statistics_export_interval: None,
            swarm_testing: false,
            debug: false,
        };
        let layout = StorageLayout::prepare(&config).unwrap();
        assert!(!layout.corpus_dir.join("stale.fzil").exists());
    }
}
