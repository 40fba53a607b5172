//! Binary entry point (§6): parse and validate flags, install signal
//! handlers, prepare the storage tree, and hand off to the single- or
//! multi-worker fuzz loop. Exit codes follow the table in §6 literally:
//! 0 normal, 1 user-initiated shutdown, 2 crash found, negative a
//! configuration error.

mod config;
mod events;
mod fuzzer;
mod signals;
mod storage;
mod worker;

use clap::Parser;

use config::{Cli, ConfigError, FuzzerConfig};
use fuzzer::ExitOutcome;
use storage::StorageLayout;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match FuzzerConfig::from_cli(cli) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "configuration rejected");
            std::process::exit(config_error_exit_code(&error));
        }
    };

    if let Err(error) = signals::install() {
        tracing::error!(%error, "failed to install signal handlers");
        std::process::exit(1);
    }

    let storage = match StorageLayout::prepare(&config) {
        Ok(storage) => storage,
        Err(error) => {
            tracing::error!(%error, "failed to prepare storage directory");
            std::process::exit(1);
        }
    };

    let outcome = match worker::run(config, storage) {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::error!(%error, "fuzz loop exited with an error");
            std::process::exit(1);
        }
    };

    std::process::exit(exit_code(outcome));
}

fn exit_code(outcome: ExitOutcome) -> i32 {
    match outcome {
        ExitOutcome::Normal => 0,
        ExitOutcome::UserStopped => 1,
        ExitOutcome::CrashFound => 2,
    }
}

/// Every `ConfigError` variant maps to a distinct negative exit code
/// (§6's "Config contradiction... negative, distinguishable"), rather
/// than collapsing them all onto one value.
fn config_error_exit_code(error: &ConfigError) -> i32 {
    match error {
        ConfigError::JobsMustBePositive(_) => -1,
        ConfigError::ConsecutiveMutationsMustBePositive(_) => -2,
        ConfigError::StatisticsIntervalWithoutExport => -3,
        ConfigError::ResumeAndOverwriteConflict => -4,
        ConfigError::InterpreterNotFound(_) => -5,
    }
}
