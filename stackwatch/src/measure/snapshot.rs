//! Stack window capture and the deepest-first diff

use crate::domain::StackGrowth;

/// A fixed-size byte capture of the stack window at one instant.
///
/// Owned exclusively by the measurement cycle that created it and discarded
/// after the diff that consumes it.
#[derive(Debug, Clone)]
pub struct StackSnapshot {
    pub base: u64,
    pub bytes: Vec<u8>,
}

impl StackSnapshot {
    #[must_use]
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Result of diffing an entry/exit snapshot pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffResult {
    /// Distance below (for a downward stack: below) the entry stack pointer
    /// of the deepest byte that changed; 0 when no byte changed.
    pub used_bytes: usize,
    /// The deepest captured byte itself changed, so the true usage may lie
    /// outside the window. The figure is a lower bound, not an exact mark.
    pub truncated: bool,
}

/// Base address of the capture window for a given entry stack pointer.
///
/// The window covers the unused side of the stack pointer: below it for a
/// downward-growing stack, above it for an upward-growing one. `None` when
/// the configured size does not fit below the stack pointer.
#[must_use]
pub fn window_base(sp: u64, budget: usize, growth: StackGrowth) -> Option<u64> {
    match growth {
        StackGrowth::Down => sp.checked_sub(budget as u64),
        StackGrowth::Up => Some(sp),
    }
}

/// Diff two snapshots of the same window, deepest byte first.
///
/// The scan starts at the byte most distant from the entry stack pointer and
/// walks toward it, stopping at the first difference; stack usage is "how
/// far from the entry stack pointer did execution write", so the deepest
/// changed byte alone determines the figure. Equal snapshots yield 0.
///
/// Snapshots are indexed by address offset from the window base, so for a
/// downward stack the deepest byte is index 0 and for an upward stack it is
/// the last index.
///
/// # Panics
/// Panics if the snapshots differ in length; both always come from the same
/// configured window.
#[must_use]
pub fn high_water_mark(entry: &[u8], exit: &[u8], growth: StackGrowth) -> DiffResult {
    assert_eq!(entry.len(), exit.len(), "snapshots must cover the same window");
    let len = entry.len();
    if len == 0 {
        return DiffResult { used_bytes: 0, truncated: false };
    }

    let deepest_diff = match growth {
        StackGrowth::Down => (0..len).find(|&i| entry[i] != exit[i]).map(|i| len - 1 - i),
        StackGrowth::Up => (0..len).rev().find(|&i| entry[i] != exit[i]),
    };

    match deepest_diff {
        Some(used_bytes) => DiffResult { used_bytes, truncated: used_bytes == len - 1 },
        None => DiffResult { used_bytes: 0, truncated: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_down(entry: &[u8], exit: &[u8]) -> DiffResult {
        high_water_mark(entry, exit, StackGrowth::Down)
    }

    #[test]
    fn test_identical_snapshots_use_zero() {
        let a = vec![0xaa; 1500];
        let result = diff_down(&a, &a.clone());
        assert_eq!(result.used_bytes, 0);
        assert!(!result.truncated);
    }

    #[test]
    fn test_single_difference_reports_its_depth() {
        // One byte differs at distance k from the shallow end
        let len = 1500;
        for k in [0, 1, 50, 749, 1400] {
            let entry = vec![0u8; len];
            let mut exit = entry.clone();
            exit[len - 1 - k] = 0xff;
            assert_eq!(diff_down(&entry, &exit).used_bytes, k, "k = {k}");
        }
    }

    #[test]
    fn test_deepest_difference_wins() {
        let len = 1500;
        let entry = vec![0u8; len];
        let mut exit = entry.clone();
        // Writes near the shallow end plus one deep touch
        for i in len - 50..len {
            exit[i] = 0xee;
        }
        exit[len - 1 - 700] = 0x01;
        assert_eq!(diff_down(&entry, &exit).used_bytes, 700);
    }

    #[test]
    fn test_shallow_writes_only() {
        // Function wrote the top 50 bytes of a 1500-byte window
        let len = 1500;
        let entry = vec![0x5a; len];
        let mut exit = entry.clone();
        for i in len - 50..len {
            exit[i] ^= 0xff;
        }
        let result = diff_down(&entry, &exit);
        assert_eq!(result.used_bytes, 49);
        assert!(!result.truncated);
    }

    #[test]
    fn test_deepest_byte_flags_truncation() {
        let len = 256;
        let entry = vec![0u8; len];
        let mut exit = entry.clone();
        exit[0] = 1; // the most distant captured byte
        let result = diff_down(&entry, &exit);
        assert_eq!(result.used_bytes, len - 1);
        assert!(result.truncated, "a mark at the window edge must be flagged as possibly truncated");
    }

    #[test]
    fn test_upward_growth_mirrors_indexing() {
        let len = 100;
        let entry = vec![0u8; len];
        let mut exit = entry.clone();
        exit[30] = 0xff; // 30 bytes above the entry stack pointer
        let result = high_water_mark(&entry, &exit, StackGrowth::Up);
        assert_eq!(result.used_bytes, 30);
        assert!(!result.truncated);

        exit[len - 1] = 0xff;
        let result = high_water_mark(&entry, &exit, StackGrowth::Up);
        assert_eq!(result.used_bytes, len - 1);
        assert!(result.truncated);
    }

    #[test]
    fn test_window_base_directions() {
        assert_eq!(window_base(0x7fff_0000, 0x1000, StackGrowth::Down), Some(0x7ffe_f000));
        assert_eq!(window_base(0x7fff_0000, 0x1000, StackGrowth::Up), Some(0x7fff_0000));
    }

    #[test]
    fn test_window_larger_than_stack_pointer_has_no_base() {
        assert_eq!(window_base(0x100, 0x1000, StackGrowth::Down), None);
        assert_eq!(window_base(0x100, 0x1000, StackGrowth::Up), Some(0x100));
    }

    #[test]
    fn test_empty_window() {
        let result = diff_down(&[], &[]);
        assert_eq!(result.used_bytes, 0);
        assert!(!result.truncated);
    }
}
