//! # Stack High-Water-Mark Measurement
//!
//! The algorithmic core. One measurement cycle per function invocation:
//!
//! 1. At the entry breakpoint, read the stack pointer `sp_start`.
//! 2. Snapshot the pristine window on the unused side of `sp_start`, sized
//!    to the function's configured budget.
//! 3. Single-step until the stack pointer moves back past `sp_start`,
//!    which means the function returned to its caller.
//! 4. Snapshot the same window again.
//! 5. Diff the snapshots from the deepest byte toward the shallow end; the
//!    first difference gives the high-water mark.
//!
//! - [`snapshot`]: the window capture and the deepest-first diff
//! - [`estimator`]: the cycle state machine driving the controller
//!
//! A cycle interrupted by debuggee termination is abandoned, never recorded
//! as zero usage. Invocations of a measured function encountered while
//! stepping (recursion, measured callees) open nested cycles so every
//! invocation produces its own record.

pub mod estimator;
pub mod snapshot;

pub use estimator::{AbandonReason, CycleOutcome, Estimator};
pub use snapshot::{high_water_mark, window_base, DiffResult, StackSnapshot};
