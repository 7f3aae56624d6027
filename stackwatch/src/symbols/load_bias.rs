//! Load-address discovery for the traced executable
//!
//! Parses /proc/pid/maps to determine the memory range the target binary is
//! mapped at. For position-independent executables the range start is the
//! load bias that converts between symbol-table addresses and runtime
//! addresses; it is also used to decide whether a return address belongs to
//! the main executable or to a shared library.

use anyhow::{Context, Result};
use log::info;
use std::fs;

/// Memory range of the loaded target binary in the debuggee's address space
#[derive(Debug, Clone, Copy)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Find the memory range of a specific binary in a process's address space.
///
/// Reads `/proc/<pid>/maps` and collects every mapping whose pathname matches
/// the given binary, returning the minimum start and maximum end across them.
///
/// # Errors
/// Returns an error if the maps file cannot be read or if the binary has no
/// mapping in the process.
pub fn executable_range(pid: i32, binary_path: &str) -> Result<MemoryRange> {
    let maps_path = format!("/proc/{pid}/maps");
    let maps = fs::read_to_string(&maps_path).context(format!("Failed to read {maps_path}"))?;

    let mut start_addr: Option<u64> = None;
    let mut end_addr: Option<u64> = None;

    for line in maps.lines() {
        if !line.ends_with(binary_path) {
            continue;
        }
        // "start-end perms offset dev inode pathname"
        let Some(range) = line.split_whitespace().next() else { continue };
        let Some((start, end)) = range.split_once('-') else { continue };
        let start = u64::from_str_radix(start, 16).context("Failed to parse range start")?;
        let end = u64::from_str_radix(end, 16).context("Failed to parse range end")?;

        start_addr = Some(start_addr.map_or(start, |s| s.min(start)));
        end_addr = Some(end_addr.map_or(end, |e| e.max(end)));
    }

    match (start_addr, end_addr) {
        (Some(start), Some(end)) => {
            info!("target mapped at 0x{start:x} - 0x{end:x} ({} KB)", (end - start) / 1024);
            Ok(MemoryRange { start, end })
        }
        _ => Err(anyhow::anyhow!("Could not find memory range for {binary_path}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_range_contains() {
        let range = MemoryRange { start: 0x1000, end: 0x2000 };

        assert!(range.contains(0x1000));
        assert!(range.contains(0x1fff));
        assert!(!range.contains(0x0fff));
        assert!(!range.contains(0x2000));
    }

    #[test]
    fn test_executable_range_self() {
        // Parse our own maps; every process maps its own executable.
        let pid = std::process::id() as i32;
        let exe = std::env::current_exe().expect("Failed to get current exe");
        let range = executable_range(pid, exe.to_str().unwrap())
            .expect("own executable must appear in /proc/self/maps");
        assert!(range.start < range.end);
    }
}
