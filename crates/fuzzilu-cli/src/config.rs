//! CLI surface and the validated [`FuzzerConfig`] derived from it (§6).
//! Parsing itself can never fail in a way worth reporting (`clap` prints
//! its own usage and exits); everything that can go wrong is a
//! *semantic* contradiction between otherwise well-formed flags, caught
//! once here rather than scattered through the fuzz loop.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

/// `fuzzilu <interpreter> [flags]` — exact flag set of spec.md §6.
#[derive(Debug, Parser)]
#[command(name = "fuzzilu")]
#[command(about = "Coverage-guided, mutation-based fuzzer for the Lua interpreter")]
#[command(version)]
pub struct Cli {
    /// Path to the instrumented Lua interpreter (a REPRL-speaking binary).
    pub interpreter: PathBuf,

    /// Number of worker fuzzers (1 = single, no extra threads spawned).
    #[arg(long = "jobs", default_value_t = 1)]
    pub jobs: u32,

    /// Mutations applied to one picked corpus sample before re-picking.
    #[arg(long = "consecutiveMutations", default_value_t = 5)]
    pub consecutive_mutations: u32,

    /// Directory for corpus / crashes / stats persistence.
    #[arg(long = "storagePath")]
    pub storage_path: PathBuf,

    /// Re-import the existing corpus from `storagePath/old_corpus`.
    #[arg(long = "resume", default_value_t = false)]
    pub resume: bool,

    /// Delete `storagePath`'s contents before starting.
    #[arg(long = "overwrite", default_value_t = false)]
    pub overwrite: bool,

    /// Periodically write statistics snapshots to `storagePath/stats`.
    #[arg(long = "exportStatistics", default_value_t = false)]
    pub export_statistics: bool,

    /// Interval, in minutes, between statistics exports. Requires
    /// `--exportStatistics`.
    #[arg(long = "statisticsExportInterval")]
    pub statistics_export_interval: Option<u64>,

    /// Randomize code-generator and mutator weights at startup.
    #[arg(long = "swarmTesting", default_value_t = false)]
    pub swarm_testing: bool,

    /// Replay existing corpus inputs and log coverage over time instead
    /// of fuzzing.
    #[arg(long = "debug", default_value_t = false)]
    pub debug: bool,
}

/// A fatal, pre-run contradiction between flags (spec.md §7 "Config
/// contradiction"). Always reported before any subprocess is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--jobs must be at least 1, got {0}")]
    JobsMustBePositive(u32),
    #[error("--consecutiveMutations must be at least 1, got {0}")]
    ConsecutiveMutationsMustBePositive(u32),
    #[error("--statisticsExportInterval requires --exportStatistics")]
    StatisticsIntervalWithoutExport,
    #[error("--resume and --overwrite are mutually exclusive")]
    ResumeAndOverwriteConflict,
    #[error("the interpreter path {0:?} does not exist")]
    InterpreterNotFound(PathBuf),
}

/// Validated, immutable configuration the fuzz loop actually runs with.
#[derive(Debug, Clone)]
pub struct FuzzerConfig {
    pub interpreter: PathBuf,
    pub jobs: u32,
    pub consecutive_mutations: u32,
    pub storage_path: PathBuf,
    pub resume: bool,
    pub overwrite: bool,
    pub export_statistics: bool,
    pub statistics_export_interval: Option<std::time::Duration>,
    pub swarm_testing: bool,
    pub debug: bool,
}

impl FuzzerConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.jobs == 0 {
            return Err(ConfigError::JobsMustBePositive(cli.jobs));
        }
        if cli.consecutive_mutations == 0 {
            return Err(ConfigError::ConsecutiveMutationsMustBePositive(cli.consecutive_mutations));
        }
        if cli.statistics_export_interval.is_some() && !cli.export_statistics {
            return Err(ConfigError::StatisticsIntervalWithoutExport);
        }
        if cli.resume && cli.overwrite {
            return Err(ConfigError::ResumeAndOverwriteConflict);
        }
        if !cli.interpreter.exists() {
            return Err(ConfigError::InterpreterNotFound(cli.interpreter));
        }

        Ok(FuzzerConfig {
            interpreter: cli.interpreter,
            jobs: cli.jobs,
            consecutive_mutations: cli.consecutive_mutations,
            storage_path: cli.storage_path,
            resume: cli.resume,
            overwrite: cli.overwrite,
            export_statistics: cli.export_statistics,
            statistics_export_interval: cli
                .statistics_export_interval
                .map(|minutes| std::time::Duration::from_secs(minutes * 60)),
            swarm_testing: cli.swarm_testing,
            debug: cli.debug,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            interpreter: std::env::current_exe().unwrap(),
            jobs: 1,
            consecutive_mutations: 5,
            storage_path: PathBuf::from("/tmp/fuzzilu-config-test"),
            resume: false,
            overwrite: false,
            export_statistics: false,
            statistics_export_interval: None,
            swarm_testing: false,
            debug: false,
        }
    }

    #[test]
    fn accepts_a_well_formed_config() {
        assert!(FuzzerConfig::from_cli(base_cli()).is_ok());
    }

    #[test]
    fn rejects_zero_jobs() {
        let mut cli = base_cli();
        cli.jobs = 0;
        assert!(matches!(FuzzerConfig::from_cli(cli), Err(ConfigError::JobsMustBePositive(0))));
    }

    #[test]
    fn rejects_statistics_interval_without_export() {
        let mut cli = base_cli();
        cli.statistics_export_interval = Some(10);
        assert!(matches!(
            FuzzerConfig::from_cli(cli),
            Err(ConfigError::StatisticsIntervalWithoutExport)
        ));
    }

    #[test]
    fn rejects_resume_and_overwrite_together() {
        let mut cli = base_cli();
        cli.resume = true;
        cli.overwrite = true;
        assert!(matches!(
            FuzzerConfig::from_cli(cli),
            Err(ConfigError::ResumeAndOverwriteConflict)
        ));
    }

    #[test]
    fn rejects_a_missing_interpreter() {
        let mut cli = base_cli();
        cli.interpreter = PathBuf::from("/nonexistent/path/to/lua");
        assert!(matches!(FuzzerConfig::from_cli(cli), Err(ConfigError::InterpreterNotFound(_))));
    }
}
