//! # Execution Control
//!
//! Drives the debuggee: launching, breakpoint planting, resuming, stepping,
//! and reading its registers and memory. All operations are strictly
//! sequential; every resume or step blocks until the debuggee stops again,
//! so no other component ever races the process state.
//!
//! - [`process`]: the ptrace plumbing (`TracedProcess`)
//! - [`breakpoint`]: INT3 byte patching
//! - [`Session`]: binds a traced process to the symbol resolver of its
//!   binary and owns the breakpoint table
//!
//! The session is the only mutator of debuggee control state. Measurement
//! code reads memory and registers through it and never touches ptrace
//! directly.

pub mod breakpoint;
pub mod process;

pub use breakpoint::Breakpoint;
pub use process::{Register, StopEvent, TracedProcess};

use anyhow::Result;
use log::{info, warn};
use nix::sys::signal::Signal;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::ControlError;
use crate::symbols::{executable_range, MemoryRange, SymbolResolver};

/// What the debuggee did after being resumed at full speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// One of the planted breakpoints fired; `addr` is its entry address
    BreakpointHit { addr: u64 },
    /// Normal termination
    Exited(i32),
    /// Fatal signal
    Crashed(Signal),
}

/// A debugging session: the traced process plus the symbol-table view of its
/// binary and the set of planted breakpoints.
pub struct Session {
    resolver: SymbolResolver,
    process: TracedProcess,
    range: Option<MemoryRange>,
    load_bias: u64,
    breakpoints: HashMap<u64, Breakpoint>,
}

impl Session {
    /// Load the target binary and launch it suspended at its first
    /// instruction, ready for breakpoint planting.
    ///
    /// # Errors
    /// `ControlError::Load` if the binary is not a debuggable ELF image,
    /// `ControlError::Launch` if the fork/exec fails.
    pub fn launch(binary: &Path, args: &[String]) -> Result<Self> {
        let resolver = SymbolResolver::load(binary)?;
        let process = TracedProcess::launch(binary, args)?;

        // PIE images land at a randomized base; plant breakpoints relative
        // to the actual mapping. Non-PIE images use their link-time layout.
        let canonical = std::fs::canonicalize(binary)?;
        let (range, load_bias) = if resolver.is_position_independent() {
            match executable_range(process.pid().as_raw(), &canonical.to_string_lossy()) {
                Ok(range) => (Some(range), range.start),
                Err(e) => {
                    warn!("could not determine load bias: {e}; assuming 0");
                    (None, 0)
                }
            }
        } else {
            (None, 0)
        };

        info!("launched {} (pid {}, load bias 0x{:x})", binary.display(), process.pid(), load_bias);
        Ok(Self { resolver, process, range, load_bias, breakpoints: HashMap::new() })
    }

    #[must_use]
    pub fn process(&self) -> &TracedProcess {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut TracedProcess {
        &mut self.process
    }

    /// Resolve a function name and plant a breakpoint at its entry.
    /// Returns the runtime entry address.
    ///
    /// # Errors
    /// `ControlError::SymbolNotFound` if the name resolves to no entry
    /// address; this is a configuration error and aborts the run.
    pub fn install_breakpoint(&mut self, function: &str) -> Result<u64, ControlError> {
        let addr = self.resolver.function_address(function)? + self.load_bias;
        let mut bp = Breakpoint::new(self.process.pid(), addr);
        bp.enable()?;
        self.breakpoints.insert(addr, bp);
        info!("breakpoint on {function} at 0x{addr:x}");
        Ok(addr)
    }

    /// Remove a planted breakpoint, restoring the original byte if the
    /// debuggee is still alive.
    pub fn remove_breakpoint(&mut self, addr: u64) -> Result<(), ControlError> {
        if let Some(mut bp) = self.breakpoints.remove(&addr) {
            if !self.process.has_exited() {
                bp.disable()?;
            }
        }
        Ok(())
    }

    /// Restore the original bytes at every planted breakpoint. Used during
    /// single-stepped measurement so the debuggee executes its real code.
    pub fn disable_breakpoints(&mut self) -> Result<(), ControlError> {
        for bp in self.breakpoints.values_mut() {
            bp.disable()?;
        }
        Ok(())
    }

    /// Re-patch every planted breakpoint after a measurement cycle.
    pub fn enable_breakpoints(&mut self) -> Result<(), ControlError> {
        if self.process.has_exited() {
            return Ok(());
        }
        for bp in self.breakpoints.values_mut() {
            bp.enable()?;
        }
        Ok(())
    }

    /// Resume the debuggee at full speed until a planted breakpoint fires or
    /// the process terminates. Non-trap stop signals are forwarded to the
    /// debuggee and the wait continues.
    pub fn resume_to_event(&mut self) -> Result<RunEvent, ControlError> {
        self.step_over_breakpoint_if_needed()?;

        let mut pending: Option<Signal> = None;
        loop {
            if self.process.has_exited() {
                return Err(ControlError::ProcessNotRunning);
            }
            match self.process.resume(pending.take())? {
                StopEvent::Trapped => {
                    // INT3 leaves the counter one byte past the patch
                    let pc = self.process.program_counter()?;
                    let entry = pc.wrapping_sub(1);
                    if self.breakpoints.get(&entry).is_some_and(Breakpoint::is_enabled) {
                        self.process.set_program_counter(entry)?;
                        return Ok(RunEvent::BreakpointHit { addr: entry });
                    }
                    warn!("stray SIGTRAP at 0x{pc:x}, resuming");
                }
                StopEvent::Stopped(sig) => {
                    warn!("debuggee stopped by {sig}, forwarding");
                    pending = Some(sig);
                }
                StopEvent::Exited(code) => return Ok(RunEvent::Exited(code)),
                StopEvent::Signaled(sig) => return Ok(RunEvent::Crashed(sig)),
            }
        }
    }

    // If the debuggee is stopped exactly on an enabled breakpoint, the patch
    // must be lifted for one instruction or the INT3 would fire again
    // without any forward progress.
    fn step_over_breakpoint_if_needed(&mut self) -> Result<(), ControlError> {
        if self.process.has_exited() {
            return Ok(());
        }
        let pc = self.process.program_counter()?;
        match self.breakpoints.get_mut(&pc) {
            Some(bp) if bp.is_enabled() => bp.disable()?,
            _ => return Ok(()),
        }
        let event = self.process.step()?;
        if matches!(event, StopEvent::Trapped | StopEvent::Stopped(_)) {
            if let Some(bp) = self.breakpoints.get_mut(&pc) {
                bp.enable()?;
            }
        }
        Ok(())
    }

    /// Best-effort label for a runtime code address (used for callers).
    #[must_use]
    pub fn label_for_address(&self, runtime_addr: u64) -> String {
        if let Some(range) = self.range {
            if !range.contains(runtime_addr) {
                return format!("<shared:0x{runtime_addr:x}>");
            }
        }
        self.resolver.function_label(runtime_addr - self.load_bias)
    }

    /// Terminate the debuggee if it is still alive (explicit end of run).
    pub fn terminate(&mut self) {
        self.process.kill();
    }
}
