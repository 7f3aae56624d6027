//! Core domain types

use serde::Serialize;
use std::fmt;

/// One function under measurement, as configured by the operator.
///
/// `max_stack_bytes` sizes the captured stack window. It must exceed the
/// function's true maximum usage or the deepest touched byte falls outside
/// the window and the reported figure is truncated (the record is then
/// flagged, see [`MeasurementRecord::truncated`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFunction {
    pub name: String,
    pub max_stack_bytes: usize,
}

impl TargetFunction {
    #[must_use]
    pub fn new(name: impl Into<String>, max_stack_bytes: usize) -> Self {
        Self { name: name.into(), max_stack_bytes }
    }
}

impl fmt::Display for TargetFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.max_stack_bytes)
    }
}

/// Direction the target's stack grows in.
///
/// A configuration-time assumption, never auto-detected. Both the capture
/// window and the depth indexing of the diff are mirrored for `Up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackGrowth {
    #[default]
    Down,
    Up,
}

/// One completed measurement cycle.
///
/// Immutable once created; ownership moves into the measurement log.
/// `used_bytes` is the distance below the entry stack pointer of the deepest
/// byte that changed between the entry and exit snapshots (0 when nothing
/// changed). `truncated` is set when the figure reached the edge of the
/// capture window, meaning the true usage may exceed the configured budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementRecord {
    pub function: String,
    pub caller: String,
    pub used_bytes: usize,
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_function_display() {
        let f = TargetFunction::new("coap2oscore", 1500);
        assert_eq!(f.to_string(), "coap2oscore (1500 bytes)");
    }

    #[test]
    fn test_stack_growth_defaults_down() {
        assert_eq!(StackGrowth::default(), StackGrowth::Down);
    }

    #[test]
    fn test_record_serializes() {
        let rec = MeasurementRecord {
            function: "edhoc_initiator_run".to_string(),
            caller: "main".to_string(),
            used_bytes: 4242,
            truncated: false,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["function"], "edhoc_initiator_run");
        assert_eq!(json["used_bytes"], 4242);
        assert_eq!(json["truncated"], false);
    }
}
