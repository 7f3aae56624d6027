//! Per-invocation measurement cycles
//!
//! The estimator takes over when an entry breakpoint fires and drives the
//! controller through one cycle: capture the entry state, step until the
//! function returns, capture the exit state, diff, record. It only reads
//! debuggee state through the session; the session alone mutates control
//! state.
//!
//! While a cycle runs every breakpoint patch is lifted and progress is pure
//! single-stepping, so a nested invocation of any measured function is
//! detected by the program counter landing on its entry address. Nested
//! invocations get nested cycles and therefore their own records; nothing
//! is merged or deduplicated.

use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;

use crate::control::{Session, StopEvent};
use crate::domain::{ControlError, MeasurementRecord, StackGrowth, TargetFunction};
use crate::measure::snapshot::{high_water_mark, window_base, StackSnapshot};
use crate::report::MeasurementLog;

/// Why an in-progress cycle was thrown away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// The debuggee exited normally before the function returned
    Exited(i32),
    /// The debuggee was killed by a fatal signal
    Crashed(String),
    /// The debuggee stopped on a signal it cannot step past
    SignalStop(String),
    /// The configured window does not fit below the stack pointer
    WindowOutOfRange,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "debuggee exited with code {code}"),
            Self::Crashed(sig) => write!(f, "debuggee killed by {sig}"),
            Self::SignalStop(sig) => write!(f, "debuggee stopped by {sig}"),
            Self::WindowOutOfRange => write!(f, "capture window underflows the address space"),
        }
    }
}

/// Outcome of one measurement cycle. `Recorded` already appended to the log;
/// `Abandoned` appended nothing (an incomplete cycle is never reported as
/// zero usage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Recorded,
    Abandoned(AbandonReason),
}

/// Drives measurement cycles against a session.
///
/// `targets` maps runtime entry addresses to the configuration of the
/// function planted there.
pub struct Estimator<'a> {
    session: &'a mut Session,
    targets: &'a HashMap<u64, TargetFunction>,
    growth: StackGrowth,
}

impl<'a> Estimator<'a> {
    pub fn new(
        session: &'a mut Session,
        targets: &'a HashMap<u64, TargetFunction>,
        growth: StackGrowth,
    ) -> Self {
        Self { session, targets, growth }
    }

    /// Run one full cycle for the breakpoint that just fired at `entry`.
    ///
    /// Lifts every breakpoint patch for the duration of the stepping loop
    /// and restores them afterwards (unless the debuggee is gone).
    ///
    /// # Errors
    /// Only on ptrace-level failures. Debuggee termination mid-cycle is not
    /// an error; it yields [`CycleOutcome::Abandoned`].
    pub fn measure_hit(
        &mut self,
        entry: u64,
        log: &mut MeasurementLog,
    ) -> Result<CycleOutcome, ControlError> {
        self.session.disable_breakpoints()?;
        let outcome = self.cycle(entry, log)?;
        self.session.enable_breakpoints()?;
        Ok(outcome)
    }

    /// One cycle: entry snapshot, step until return, exit snapshot, diff.
    /// Recurses for nested invocations encountered while stepping.
    fn cycle(&mut self, entry: u64, log: &mut MeasurementLog) -> Result<CycleOutcome, ControlError> {
        let Some(target) = self.targets.get(&entry).cloned() else {
            warn!("trap at 0x{entry:x} matches no configured function, skipping");
            return Ok(CycleOutcome::Abandoned(AbandonReason::SignalStop("SIGTRAP".into())));
        };

        let sp_start = self.session.process().stack_pointer()?;

        // The caller is the second frame up: at function entry the return
        // address sits on top of the stack (x86-64 call pushed it).
        let caller = match self.session.process().read_word(sp_start) {
            Ok(ret) => self.session.label_for_address(ret),
            Err(_) => "<unknown>".to_string(),
        };

        let budget = target.max_stack_bytes;
        let Some(base) = window_base(sp_start, budget, self.growth) else {
            warn!(
                "{}: {budget}-byte window does not fit below sp 0x{sp_start:x}, abandoning",
                target.name
            );
            return Ok(CycleOutcome::Abandoned(AbandonReason::WindowOutOfRange));
        };
        let entry_snapshot =
            StackSnapshot::new(base, self.session.process().read_memory(base, budget)?);
        debug!(
            "cycle start: {} sp=0x{sp_start:x} window=[0x{base:x}, 0x{:x}) caller={caller}",
            target.name,
            base + budget as u64
        );

        // Step until the stack pointer moves back past its entry value,
        // which signals the return to the caller. Fail-safe: debuggee
        // termination abandons the cycle instead of recording zero usage.
        loop {
            match self.session.process_mut().step()? {
                StopEvent::Trapped => {}
                StopEvent::Stopped(sig) => {
                    warn!("{}: stopped by {sig} mid-cycle, abandoning", target.name);
                    return Ok(CycleOutcome::Abandoned(AbandonReason::SignalStop(sig.to_string())));
                }
                StopEvent::Exited(code) => {
                    warn!("{}: debuggee exited mid-cycle, abandoning", target.name);
                    return Ok(CycleOutcome::Abandoned(AbandonReason::Exited(code)));
                }
                StopEvent::Signaled(sig) => {
                    warn!("{}: debuggee killed by {sig} mid-cycle, abandoning", target.name);
                    return Ok(CycleOutcome::Abandoned(AbandonReason::Crashed(sig.to_string())));
                }
            }

            let sp = self.session.process().stack_pointer()?;
            let returned = match self.growth {
                StackGrowth::Down => sp > sp_start,
                StackGrowth::Up => sp < sp_start,
            };
            if returned {
                break;
            }

            // A measured entry reached at greater depth is a new invocation
            // (recursion or a measured callee): open a nested cycle.
            let pc = self.session.process().program_counter()?;
            let deeper = match self.growth {
                StackGrowth::Down => sp < sp_start,
                StackGrowth::Up => sp > sp_start,
            };
            if deeper && self.targets.contains_key(&pc) {
                match self.cycle(pc, log)? {
                    CycleOutcome::Recorded => {}
                    abandoned @ CycleOutcome::Abandoned(_) => return Ok(abandoned),
                }
            }
        }

        let exit_snapshot = StackSnapshot::new(
            entry_snapshot.base,
            self.session.process().read_memory(entry_snapshot.base, budget)?,
        );
        let diff = high_water_mark(&entry_snapshot.bytes, &exit_snapshot.bytes, self.growth);
        if diff.truncated {
            warn!(
                "{}: deepest captured byte changed; true usage may exceed the {budget}-byte budget",
                target.name
            );
        }

        log.record(MeasurementRecord {
            function: target.name,
            caller,
            used_bytes: diff.used_bytes,
            truncated: diff.truncated,
        });
        Ok(CycleOutcome::Recorded)
    }
}
