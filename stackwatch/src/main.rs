//! # stackwatch - Main Entry Point
//!
//! Orchestrates one measurement run: preflight checks, session launch,
//! breakpoint planting, the hit/measure/resume loop, and report output.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;

use stackwatch::cli::Args;
use stackwatch::control::{RunEvent, Session};
use stackwatch::domain::{ControlError, TargetFunction};
use stackwatch::measure::{CycleOutcome, Estimator};
use stackwatch::preflight::run_preflight_checks;
use stackwatch::report::{HtmlReport, JsonReport, MeasurementLog, ReportSink};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    run_preflight_checks(&args.target, quiet)?;

    if !quiet {
        println!("stackwatch v{}", env!("CARGO_PKG_VERSION"));
        println!("target: {}", args.target.display());
        for f in &args.functions {
            println!("function: {f}");
        }
    }

    // ── Phase 1: launch suspended and plant breakpoints ─────────────────
    let mut session = Session::launch(&args.target, &args.debuggee_args)?;

    // Symbol resolution failures abort before the debuggee runs: a silently
    // skipped function would pass a build that was never measured.
    let mut targets: HashMap<u64, TargetFunction> = HashMap::new();
    for function in &args.functions {
        let addr = match session.install_breakpoint(&function.name) {
            Ok(addr) => addr,
            Err(e) => {
                session.terminate();
                return Err(e).context("breakpoint planting failed");
            }
        };
        targets.insert(addr, function.clone());
    }

    // ── Phase 2: run until exit, measuring every breakpoint hit ─────────
    let mut log = MeasurementLog::new();
    loop {
        match session.resume_to_event() {
            Ok(RunEvent::BreakpointHit { addr }) => {
                let mut estimator = Estimator::new(&mut session, &targets, args.stack_growth);
                match estimator.measure_hit(addr, &mut log)? {
                    CycleOutcome::Recorded => {}
                    CycleOutcome::Abandoned(reason) => {
                        warn!("measurement cycle abandoned: {reason}");
                        if session.process().has_exited() {
                            break;
                        }
                    }
                }
            }
            Ok(RunEvent::Exited(code)) => {
                info!("debuggee exited with code {code}");
                break;
            }
            Ok(RunEvent::Crashed(sig)) => {
                warn!("debuggee killed by {sig}; keeping records collected so far");
                break;
            }
            Err(ControlError::ProcessNotRunning) => break,
            Err(e) => {
                session.terminate();
                return Err(e.into());
            }
        }
    }

    // Explicit end of run regardless of which functions were hit
    session.terminate();

    // ── Phase 3: report ─────────────────────────────────────────────────
    if !quiet {
        println!("\n{} measurement(s):", log.len());
        for record in log.records() {
            let mark = if record.truncated {
                format!(">= {} (budget exceeded?)", record.used_bytes)
            } else {
                record.used_bytes.to_string()
            };
            println!("  {:<32} {:<32} {mark}", record.function, record.caller);
        }
        for function in &args.functions {
            if log.count_for(&function.name) == 0 {
                println!("  {:<32} never called", function.name);
            }
        }
    }

    if let Some(ref path) = args.report {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        HtmlReport::append_to(path)?.write_records(&log, &args.build_flags)?;
        if !quiet {
            println!("report: {}", path.display());
        }
    }

    if let Some(ref path) = args.export {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        JsonReport::new(BufWriter::new(file)).write_records(&log, &args.build_flags)?;
        if !quiet {
            println!("export: {}", path.display());
        }
    }

    Ok(())
}
