//! # stackwatch - Dynamic Stack High-Water-Mark Profiler
//!
//! stackwatch measures the maximum stack memory consumed by a set of target
//! functions during the execution of a compiled program, without touching the
//! program's source. It exists to validate that embedded firmware functions
//! stay within a fixed stack budget.
//!
//! ## How a measurement works
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Target Program (ELF)                    │
//! │            launched under ptrace, lock-stepped              │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ breakpoint at function entry
//!                            ▼
//!   sp_start ──►  ┌───────────────────────┐
//!                 │ snapshot window below │  entry snapshot
//!                 │ sp (budget bytes)     │
//!                 └───────────────────────┘
//!                            │ single-step until sp > sp_start
//!                            ▼
//!                 ┌───────────────────────┐
//!                 │ same window again     │  exit snapshot
//!                 └───────────────────────┘
//!                            │ diff, deepest byte first
//!                            ▼
//!            (function, caller, bytes used) record
//! ```
//!
//! The deepest byte that changed between the two snapshots is the high-water
//! mark: how far below its entry stack pointer the function ever wrote.
//!
//! ## Module Structure
//!
//! - [`control`]: the execution controller — launch under `ptrace(TRACEME)`,
//!   INT3 breakpoints, blocking resume/step, register and memory reads
//! - [`measure`]: the estimator — one snapshot/step/snapshot/diff cycle per
//!   invocation, including nested invocations of measured functions
//! - [`symbols`]: ELF symbol table and DWARF lookups for breakpoint planting
//!   and caller labels, with PIE load-bias handling
//! - [`report`]: the append-only measurement log plus HTML and JSON sinks
//! - [`preflight`]: environment checks before the debuggee is launched
//! - [`cli`], [`domain`]: argument parsing and shared types/errors
//!
//! ## Execution model
//!
//! Everything is single-threaded and strictly sequential: each resume or
//! single-step blocks until the debuggee stops again, so controller and
//! debuggee advance in lock-step and no concurrent mutation of process state
//! exists anywhere.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Check two firmware entry points against their budgets
//! stackwatch ./zephyr.elf -f coap2oscore=1500 -f oscore2coap=1500 \
//!     --report build_reports/stack_report.html --build-flags "-Os -g"
//! ```
//!
//! A function with a configured budget that is never called simply yields no
//! records. A budget that turns out too small is reported as a flagged lower
//! bound, never as a silently truncated exact figure.

pub mod cli;
pub mod control;
pub mod domain;
pub mod measure;
pub mod preflight;
pub mod report;
pub mod symbols;
