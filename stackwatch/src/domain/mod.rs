//! Domain model for stackwatch
//!
//! Core domain types and errors shared across the pipeline:
//! - Plain immutable configuration and record types
//! - Structured error handling via thiserror

pub mod errors;
pub mod types;

pub use types::{MeasurementRecord, StackGrowth, TargetFunction};

pub use errors::{ControlError, ReportError};
