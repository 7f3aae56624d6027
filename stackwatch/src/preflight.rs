//! Pre-flight checks for stackwatch
//!
//! Validates system requirements before launching the debuggee.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use object::{Object, ObjectSymbol};
use std::path::Path;

/// Run all pre-flight checks before launching the target
pub fn run_preflight_checks(target: &Path, quiet: bool) -> Result<()> {
    check_binary_exists(target)?;
    check_debuggable_image(target, quiet)?;
    check_ptrace_allowed()?;
    Ok(())
}

fn check_binary_exists(target: &Path) -> Result<()> {
    if !target.exists() {
        bail!("Target binary not found: {}", target.display());
    }
    if !target.is_file() {
        bail!("Target is not a file: {}", target.display());
    }
    Ok(())
}

/// Check that the target parses as an ELF image and warn when it carries no
/// function symbols (every breakpoint lookup would fail).
fn check_debuggable_image(target: &Path, quiet: bool) -> Result<()> {
    let data = std::fs::read(target)
        .with_context(|| format!("Failed to read {}", target.display()))?;
    let obj = object::File::parse(&*data)
        .with_context(|| format!("{} is not a debuggable executable image", target.display()))?;

    let has_functions = obj
        .symbols()
        .chain(obj.dynamic_symbols())
        .any(|s| s.kind() == object::SymbolKind::Text);
    if !has_functions && !quiet {
        eprintln!(
            "warning: {} carries no function symbols; was it stripped?\n\
             Breakpoint planting needs a symbol table (build with debug info).",
            target.display()
        );
    }
    Ok(())
}

/// Check the Yama ptrace policy. Tracing a forked child is allowed under
/// scopes 0-2 for root and 0-1 for ordinary users; scope 3 disables ptrace
/// entirely.
fn check_ptrace_allowed() -> Result<()> {
    let scope = match std::fs::read_to_string("/proc/sys/kernel/yama/ptrace_scope") {
        Ok(s) => s.trim().parse::<u32>().unwrap_or(0),
        // No Yama, no restriction
        Err(_) => return Ok(()),
    };

    let is_root = unsafe { libc::geteuid() } == 0;
    match scope {
        0 | 1 => Ok(()),
        2 if is_root => Ok(()),
        2 => bail!(
            "Permission denied: kernel.yama.ptrace_scope=2 restricts ptrace to \
             privileged processes.\n\nRun with: sudo stackwatch ..."
        ),
        _ => bail!(
            "Permission denied: kernel.yama.ptrace_scope=3 disables ptrace on this \
             system; stack measurement cannot run."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_rejected() {
        let err = run_preflight_checks(Path::new("/nonexistent/zephyr.elf"), true).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_own_binary_passes_image_check() {
        let exe = std::env::current_exe().unwrap();
        check_binary_exists(&exe).unwrap();
        check_debuggable_image(&exe, true).unwrap();
    }
}
