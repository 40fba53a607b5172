//! `--jobs=N` dispatch (§5): each worker is an independent [`Fuzzer`] on
//! its own OS thread with its own corpus, evaluator, and REPRL child —
//! nothing about the loop itself is shared. The only cross-thread
//! traffic is a best-effort broadcast of newly interesting programs,
//! carried as the same serialized `.fzil` bytes the corpus already
//! writes to disk, since [`fuzzilu_ir::Program`] holds `Rc` fields and
//! so isn't itself `Send`.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::config::FuzzerConfig;
use crate::fuzzer::{ExitOutcome, Fuzzer};
use crate::storage::StorageLayout;

pub fn run(config: FuzzerConfig, storage: StorageLayout) -> anyhow::Result<ExitOutcome> {
    if config.debug {
        let (tx, _rx) = mpsc::channel();
        let mut fuzzer = Fuzzer::new(config, storage, tx)?;
        return fuzzer.run_debug();
    }

    if config.jobs == 1 {
        let (tx, _rx) = mpsc::channel();
        let mut fuzzer = Fuzzer::new(config, storage, tx)?;
        return fuzzer.run();
    }

    run_multi(config, storage)
}

fn run_multi(config: FuzzerConfig, storage: StorageLayout) -> anyhow::Result<ExitOutcome> {
    let jobs = config.jobs as usize;

    let (senders, receivers): (Vec<Sender<Vec<u8>>>, Vec<Receiver<Vec<u8>>>) =
        (0..jobs).map(|_| mpsc::channel()).unzip();

    let mut handles = Vec::with_capacity(jobs);
    for (index, receiver) in receivers.into_iter().enumerate() {
        let config = config.clone();
        let storage = storage.worker_view(index)?;
        let peers: Vec<Sender<Vec<u8>>> =
            senders.iter().enumerate().filter(|(i, _)| *i != index).map(|(_, s)| s.clone()).collect();

        handles.push(thread::spawn(move || -> anyhow::Result<ExitOutcome> {
            let (events_tx, _events_rx) = mpsc::channel();
            let mut fuzzer = Fuzzer::new(config, storage, events_tx)?;
            fuzzer.set_peers(peers, receiver);
            fuzzer.run()
        }));
    }

    let mut overall = ExitOutcome::Normal;
    for handle in handles {
        match handle.join() {
            Ok(Ok(outcome)) => overall = combine(overall, outcome),
            Ok(Err(error)) => tracing::error!(%error, "worker thread returned an error"),
            Err(_) => tracing::error!("worker thread panicked"),
        }
    }
    Ok(overall)
}

fn combine(a: ExitOutcome, b: ExitOutcome) -> ExitOutcome {
    use ExitOutcome::*;
    match (a, b) {
        (CrashFound, _) | (_, CrashFound) => CrashFound,
        (UserStopped, _) | (_, UserStopped) => UserStopped,
        (Normal, Normal) => Normal,
    }
}
