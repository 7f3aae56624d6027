//! # Symbol Resolution and Address Translation
//!
//! Two translations are needed per run:
//!
//! - **name → entry address** when planting breakpoints: the configured
//!   function names are looked up in the ELF symbol table of the target.
//! - **address → name** when labeling the caller of a measured function:
//!   the return address found on the stack at function entry is resolved
//!   through DWARF debug info (addr2line) and demangled.
//!
//! Both directions work on file-relative addresses. Modern executables are
//! PIE, so the runtime image sits at a randomized base; [`load_bias`] parses
//! `/proc/<pid>/maps` to find where the target was actually mapped, and the
//! session adds/subtracts that bias when crossing between symbol-table and
//! runtime address spaces. Non-PIE images get a bias of zero.

pub mod load_bias;
pub mod resolver;

pub use load_bias::{executable_range, MemoryRange};
pub use resolver::SymbolResolver;
