//! End-to-end measurement against the `stack-fixture` debuggee.
//!
//! These tests fork real child processes under ptrace, which works for
//! unprivileged users under the default Yama policy (tracing your own
//! children is always allowed for scope 0 and 1).

#![cfg(all(target_os = "linux", target_arch = "x86_64"))]

use std::collections::HashMap;
use std::path::Path;

use stackwatch::control::{RunEvent, Session};
use stackwatch::domain::{StackGrowth, TargetFunction};
use stackwatch::measure::{CycleOutcome, Estimator};
use stackwatch::report::MeasurementLog;

fn fixture_path() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_stack-fixture"))
}

/// Launch the fixture, plant the given breakpoints, and measure every hit
/// until the process terminates. Returns the collected log.
fn sweep(functions: &[(&str, usize)], debuggee_args: &[String]) -> MeasurementLog {
    let mut session = Session::launch(fixture_path(), debuggee_args).expect("launch fixture");

    let mut targets: HashMap<u64, TargetFunction> = HashMap::new();
    for &(name, budget) in functions {
        let addr = session.install_breakpoint(name).expect("install breakpoint");
        targets.insert(addr, TargetFunction::new(name, budget));
    }

    let mut log = MeasurementLog::new();
    loop {
        match session.resume_to_event() {
            Ok(RunEvent::BreakpointHit { addr }) => {
                let mut estimator = Estimator::new(&mut session, &targets, StackGrowth::Down);
                match estimator.measure_hit(addr, &mut log).expect("measure") {
                    CycleOutcome::Recorded => {}
                    CycleOutcome::Abandoned(_) => {
                        if session.process().has_exited() {
                            break;
                        }
                    }
                }
            }
            Ok(RunEvent::Exited(_) | RunEvent::Crashed(_)) => break,
            Err(e) => panic!("run failed: {e}"),
        }
    }
    session.terminate();
    log
}

#[test]
fn test_launch_and_run_to_exit() {
    let mut session = Session::launch(fixture_path(), &[]).expect("launch fixture");
    match session.resume_to_event().expect("resume") {
        RunEvent::Exited(code) => assert_eq!(code, 0),
        other => panic!("expected clean exit, got {other:?}"),
    }
    assert!(session.process().has_exited());
}

#[test]
fn test_removed_breakpoint_restores_byte_and_never_fires() {
    let mut session = Session::launch(fixture_path(), &[]).expect("launch fixture");
    let addr = session.install_breakpoint("scribble").expect("install breakpoint");

    let patched = session.process().read_word(addr).expect("read patched word");
    assert_eq!(patched & 0xff, 0xcc, "int3 must be planted at the entry");

    session.remove_breakpoint(addr).expect("remove breakpoint");
    let restored = session.process().read_word(addr).expect("read restored word");
    assert_ne!(restored & 0xff, 0xcc, "the original entry byte must come back");

    // With the patch gone the function runs through without trapping
    match session.resume_to_event().expect("resume") {
        RunEvent::Exited(code) => assert_eq!(code, 0),
        other => panic!("expected clean exit, got {other:?}"),
    }
}

#[test]
fn test_single_invocation_yields_one_record() {
    let log = sweep(&[("scribble", 4096)], &[]);

    assert_eq!(log.count_for("scribble"), 1);
    let record = &log.records()[0];
    // scribble writes a 64-byte buffer; frame setup and callees add more,
    // but usage must land between the buffer size and the window size
    assert!(record.used_bytes >= 64, "used {} bytes", record.used_bytes);
    assert!(record.used_bytes < 4096, "used {} bytes", record.used_bytes);
    assert!(!record.truncated);
    assert!(record.caller.contains("main"), "caller was {:?}", record.caller);
}

#[test]
fn test_recursion_yields_one_record_per_invocation() {
    // recurse(2) makes 3 invocations in total; none are merged
    let log = sweep(&[("recurse", 2048)], &[]);

    assert_eq!(log.count_for("recurse"), 3);
    for record in log.records() {
        assert!(record.used_bytes > 0);
        assert!(!record.truncated);
    }
}

#[test]
fn test_never_called_function_yields_no_records() {
    let log = sweep(&[("scribble", 4096), ("idle_helper", 1024)], &[]);

    assert_eq!(log.count_for("idle_helper"), 0);
    assert_eq!(log.count_for("scribble"), 1);
}

#[test]
fn test_undersized_budget_is_flagged_as_truncated() {
    // A 2048-byte window cannot hold blast's 4096-byte buffer, so the
    // deepest captured byte changes and the record must carry the flag
    let log = sweep(&[("blast", 2048)], &[]);

    assert_eq!(log.count_for("blast"), 1);
    let record = &log.records()[0];
    assert!(record.truncated, "window-edge hit must be flagged");
    assert_eq!(record.used_bytes, 2047);
}

#[test]
fn test_window_underflow_abandons_instead_of_panicking() {
    // A window larger than the stack pointer itself cannot be captured;
    // the cycle is abandoned cleanly and the run continues to exit
    let log = sweep(&[("scribble", 1 << 47)], &[]);
    assert_eq!(log.count_for("scribble"), 0);
}

#[test]
fn test_crash_mid_cycle_keeps_earlier_records() {
    // crash_me segfaults while being measured; the in-progress cycle is
    // dropped but the records collected before it survive
    let log = sweep(
        &[("scribble", 4096), ("crash_me", 1024)],
        &["--crash".to_string()],
    );

    assert_eq!(log.count_for("scribble"), 1);
    assert_eq!(log.count_for("crash_me"), 0);
}

#[test]
fn test_repeated_runs_are_deterministic() {
    let first = sweep(&[("scribble", 4096)], &[]);
    let second = sweep(&[("scribble", 4096)], &[]);

    assert_eq!(first.records()[0].used_bytes, second.records()[0].used_bytes);
}
