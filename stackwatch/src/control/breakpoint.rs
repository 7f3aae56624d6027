//! INT3 software breakpoints
//!
//! A breakpoint patches the first byte of the function entry with the x86
//! `int3` opcode and keeps the original byte so it can be restored. Enabling
//! and disabling are idempotent. The patched byte must be restored before
//! executing the entry instruction, so the session disables every breakpoint
//! for the duration of a single-stepped measurement cycle.

#![allow(unsafe_code, unused_unsafe)] // POKEDATA into debuggee text

use libc::c_long;
use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::domain::ControlError;

const INT3: u64 = 0xcc;

/// One active breakpoint tied to exactly one target function
#[derive(Debug)]
pub struct Breakpoint {
    pid: Pid,
    addr: u64,
    saved_byte: Option<u8>,
}

impl Breakpoint {
    #[must_use]
    pub fn new(pid: Pid, addr: u64) -> Self {
        Self { pid, addr, saved_byte: None }
    }

    /// Runtime address of the patched instruction
    #[must_use]
    pub fn addr(&self) -> u64 {
        self.addr
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.saved_byte.is_some()
    }

    /// Patch the entry byte with `int3`
    pub fn enable(&mut self) -> Result<(), ControlError> {
        if self.is_enabled() {
            return Ok(());
        }
        let word = ptrace::read(self.pid, self.addr as ptrace::AddressType)? as u64;
        let patched = (word & !0xff) | INT3;
        // SAFETY: addr is a mapped text address of the stopped debuggee
        unsafe {
            ptrace::write(self.pid, self.addr as ptrace::AddressType, patched as c_long)?;
        }
        self.saved_byte = Some((word & 0xff) as u8);
        Ok(())
    }

    /// Restore the original entry byte
    pub fn disable(&mut self) -> Result<(), ControlError> {
        let Some(saved) = self.saved_byte else {
            return Ok(());
        };
        // Re-read the word: the surrounding bytes may have changed since enable()
        let word = ptrace::read(self.pid, self.addr as ptrace::AddressType)? as u64;
        let restored = (word & !0xff) | u64::from(saved);
        // SAFETY: restores the byte that was read from this very address
        unsafe {
            ptrace::write(self.pid, self.addr as ptrace::AddressType, restored as c_long)?;
        }
        self.saved_byte = None;
        Ok(())
    }
}

impl Drop for Breakpoint {
    /// Best-effort restore of the patched byte. Fails silently when the
    /// debuggee is already gone.
    fn drop(&mut self) {
        if self.is_enabled() {
            let _ = self.disable();
        }
    }
}
