//! Traced debuggee process
//!
//! Launches the target under `ptrace(TRACEME)` and drives it in lock-step:
//! every resume and single-step blocks on `waitpid` until the debuggee stops
//! again, so the caller always observes a quiescent process. Bulk memory is
//! read with `process_vm_readv`; registers with `PTRACE_GETREGS`.

#![allow(unsafe_code)] // fork() requires unsafe

use log::{debug, warn};
use nix::sys::personality::{self, Persona};
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::uio::{process_vm_readv, RemoteIoVec};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{execv, fork, ForkResult, Pid};
use std::ffi::CString;
use std::io::IoSliceMut;
use std::path::Path;

use crate::domain::ControlError;

const PAGE_SIZE: u64 = 4096;

/// How the debuggee came to a stop (or to an end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopEvent {
    /// SIGTRAP: a breakpoint fired or a single step completed
    Trapped,
    /// Stopped by some other signal (not yet delivered)
    Stopped(Signal),
    /// Normal termination with the given exit code
    Exited(i32),
    /// Killed by a fatal signal
    Signaled(Signal),
}

/// A debuggee register readable while the process is stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    InstructionPointer,
    StackPointer,
    FramePointer,
}

/// A process running under ptrace control
pub struct TracedProcess {
    pid: Pid,
    running: bool,
}

impl TracedProcess {
    /// Fork and exec the target, stopped at its first instruction.
    ///
    /// The child requests tracing before exec, so the parent returns with the
    /// debuggee suspended at the exec trap, ready for breakpoint planting.
    ///
    /// # Errors
    /// Returns [`ControlError::Launch`] if the fork or exec fails.
    pub fn launch(path: &Path, args: &[String]) -> Result<Self, ControlError> {
        let launch_err = |reason: String| ControlError::Launch { path: path.to_path_buf(), reason };

        // Build the argv before forking; no allocation between fork and exec.
        let c_path = CString::new(path.as_os_str().as_encoded_bytes())
            .map_err(|e| launch_err(e.to_string()))?;
        let mut c_args = vec![c_path.clone()];
        for arg in args {
            c_args.push(CString::new(arg.as_str()).map_err(|e| launch_err(e.to_string()))?);
        }

        // SAFETY: the child only calls async-signal-safe functions before exec
        match unsafe { fork() }.map_err(|e| launch_err(e.to_string()))? {
            ForkResult::Parent { child } => {
                let mut process = Self { pid: child, running: true };
                match process.wait_stop()? {
                    StopEvent::Trapped | StopEvent::Stopped(_) => {
                        debug!("debuggee {child} stopped at exec");
                        Ok(process)
                    }
                    StopEvent::Exited(code) => {
                        Err(launch_err(format!("exited with code {code} before exec trap")))
                    }
                    StopEvent::Signaled(sig) => {
                        Err(launch_err(format!("killed by {sig} before exec trap")))
                    }
                }
            }
            ForkResult::Child => {
                // Address randomization off, so identical runs see identical
                // stack layouts and measurements stay reproducible
                if let Ok(persona) = personality::get() {
                    let _ = personality::set(persona | Persona::ADDR_NO_RANDOMIZE);
                }
                if ptrace::traceme().is_ok() && execv(&c_path, &c_args).is_ok() {
                    unreachable!()
                }
                // exec failed; the parent sees Exited(127) instead of the trap
                std::process::exit(127);
            }
        }
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Idempotent liveness check
    #[must_use]
    pub fn has_exited(&self) -> bool {
        !self.running
    }

    /// Read one register of the stopped debuggee.
    ///
    /// # Errors
    /// Fails with [`ControlError::ProcessNotRunning`] after termination.
    pub fn read_register(&self, register: Register) -> Result<u64, ControlError> {
        self.ensure_running()?;
        let regs = ptrace::getregs(self.pid)?;
        Ok(match register {
            Register::InstructionPointer => regs.rip,
            Register::StackPointer => regs.rsp,
            Register::FramePointer => regs.rbp,
        })
    }

    pub fn stack_pointer(&self) -> Result<u64, ControlError> {
        self.read_register(Register::StackPointer)
    }

    pub fn program_counter(&self) -> Result<u64, ControlError> {
        self.read_register(Register::InstructionPointer)
    }

    /// Rewind the program counter (used after an INT3 fired, which leaves it
    /// one byte past the patched instruction).
    pub fn set_program_counter(&self, pc: u64) -> Result<(), ControlError> {
        self.ensure_running()?;
        let mut regs = ptrace::getregs(self.pid)?;
        regs.rip = pc;
        ptrace::setregs(self.pid, regs)?;
        Ok(())
    }

    /// Read one machine word of debuggee memory
    pub fn read_word(&self, addr: u64) -> Result<u64, ControlError> {
        self.ensure_running()?;
        Ok(ptrace::read(self.pid, addr as ptrace::AddressType)? as u64)
    }

    /// Read a region of debuggee memory, page by page.
    ///
    /// The capture window below the stack pointer may extend past the pages
    /// the kernel has materialized for the stack, so unreadable pages are
    /// zero-filled rather than failing the whole read. A page that is
    /// unmapped at entry and written by exit then diffs as touched, which is
    /// the correct interpretation.
    pub fn read_memory(&self, addr: u64, len: usize) -> Result<Vec<u8>, ControlError> {
        self.ensure_running()?;
        let mut buf = vec![0u8; len];
        let mut offset = 0usize;
        while offset < len {
            let chunk_addr = addr + offset as u64;
            let page_end = (chunk_addr | (PAGE_SIZE - 1)) + 1;
            let chunk_len = ((page_end - chunk_addr) as usize).min(len - offset);

            let mut local = [IoSliceMut::new(&mut buf[offset..offset + chunk_len])];
            let remote = [RemoteIoVec { base: chunk_addr as usize, len: chunk_len }];
            if let Err(e) = process_vm_readv(self.pid, &mut local, &remote) {
                debug!("unreadable page at 0x{chunk_addr:x} ({e}), zero-filling");
            }
            offset += chunk_len;
        }
        Ok(buf)
    }

    /// Execute exactly one instruction, then stop again
    pub fn step(&mut self) -> Result<StopEvent, ControlError> {
        self.ensure_running()?;
        ptrace::step(self.pid, None)?;
        self.wait_stop()
    }

    /// Resume at full speed until the next stop event
    pub fn resume(&mut self, signal: Option<Signal>) -> Result<StopEvent, ControlError> {
        self.ensure_running()?;
        ptrace::cont(self.pid, signal)?;
        self.wait_stop()
    }

    /// Terminate the debuggee if it is still alive and reap it
    pub fn kill(&mut self) {
        if !self.running {
            return;
        }
        if let Err(e) = ptrace::kill(self.pid) {
            warn!("failed to kill debuggee {}: {e}", self.pid);
            return;
        }
        let _ = waitpid(self.pid, None);
        self.running = false;
    }

    fn ensure_running(&self) -> Result<(), ControlError> {
        if self.running {
            Ok(())
        } else {
            Err(ControlError::ProcessNotRunning)
        }
    }

    fn wait_stop(&mut self) -> Result<StopEvent, ControlError> {
        match waitpid(self.pid, None)? {
            WaitStatus::Stopped(_, Signal::SIGTRAP) => Ok(StopEvent::Trapped),
            WaitStatus::Stopped(_, sig) => Ok(StopEvent::Stopped(sig)),
            WaitStatus::Exited(_, code) => {
                self.running = false;
                debug!("debuggee exited with code {code}");
                Ok(StopEvent::Exited(code))
            }
            WaitStatus::Signaled(_, sig, _) => {
                self.running = false;
                warn!("debuggee killed by {sig}");
                Ok(StopEvent::Signaled(sig))
            }
            other => {
                warn!("unexpected wait status {other:?}");
                Ok(StopEvent::Stopped(Signal::SIGSTOP))
            }
        }
    }
}

impl Drop for TracedProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
