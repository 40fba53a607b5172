//! Exercises the REPRL transport against the fake target in
//! `tests/fixtures/fake_reprl_target.rs`: a normal round-trip, coverage
//! stability across re-executions, crash classification, and the
//! timeout/respawn path — scenarios E5 and E6 and invariant 11.

use std::time::Duration;

use fuzzilu_runner::{classify_crash, compute_aspect_intersection, CrashClassification, Reprl};

fn spawn() -> Reprl {
    let target = env!("CARGO_BIN_EXE_fuzzilu-fake-reprl-target");
    Reprl::spawn(target, &[]).expect("fake target should handshake cleanly")
}

#[test]
fn reprl_round_trip_reports_exit_code_and_coverage() {
    let mut reprl = spawn();
    let outcome = reprl.execute(b"return 42", Duration::from_secs(5)).expect("execute");

    assert!(!outcome.timed_out);
    assert_eq!(outcome.status.exit_code, 42);
    assert_eq!(outcome.status.signal, 0);
    assert!(!outcome.is_crash());
    assert!(!reprl.coverage().edges_hit().is_empty());
}

#[test]
fn repeated_execution_of_the_same_script_hits_a_stable_edge_set() {
    let mut reprl = spawn();
    let script = b"local x = 1 + 1";

    reprl.execute(script, Duration::from_secs(5)).expect("warm-up execute");
    let initial_edges = reprl.coverage().edges_hit();
    let initial = fuzzilu_runner::ProgramAspects { edges: initial_edges };

    let result = compute_aspect_intersection(&initial, || {
        reprl
            .execute(script, Duration::from_secs(5))
            .map(|_| reprl.coverage().edges_hit())
            .map_err(|err| err.to_string())
    });

    let stable = result.expect("no transport error").expect("edges should stabilize, not be flaky");
    assert_eq!(stable.edges, initial.edges);
}

#[test]
fn crashing_script_is_classified_deterministic() {
    let mut reprl = spawn();
    let script = b"trigger CRASH now";

    let first = reprl.execute(script, Duration::from_secs(5)).expect("execute");
    assert!(first.is_crash());
    assert_eq!(first.status.signal, 11);

    let report =
        classify_crash(&mut reprl, script, Duration::from_secs(5), first.status).expect("classify_crash");
    assert_eq!(report.classification, CrashClassification::Deterministic);
    assert!(report.is_deterministic());
    assert!(!report.signature.is_empty());
}

#[test]
fn hanging_script_times_out_and_respawns() {
    let mut reprl = spawn();
    let outcome = reprl
        .execute(b"please HANG forever", Duration::from_millis(200))
        .expect("execute should report a timeout, not an error");

    assert!(outcome.timed_out);

    // the respawned child should still answer a normal script afterwards
    let recovered = reprl.execute(b"return 42", Duration::from_secs(5)).expect("execute after respawn");
    assert_eq!(recovered.status.exit_code, 42);
}
