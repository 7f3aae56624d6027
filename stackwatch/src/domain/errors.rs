//! Structured error types for stackwatch
//!
//! Using thiserror for automatic Display implementation and error chaining.
//!
//! Configuration-time failures (load, launch, symbol resolution) are fatal
//! and stop the run before any measurement happens. Execution-time anomalies
//! (the debuggee exiting mid-cycle) are not errors at all: they abandon the
//! affected cycle and are modeled in the measurement layer, so records
//! collected before the anomaly stay reportable.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("failed to load target binary {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("failed to launch {}: {reason}", path.display())]
    Launch { path: PathBuf, reason: String },

    #[error("no resolvable entry address for function \"{0}\"")]
    SymbolNotFound(String),

    #[error("debuggee is no longer running")]
    ProcessNotRunning,

    #[error("ptrace request failed: {0}")]
    Ptrace(#[from] nix::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_not_found_display() {
        let err = ControlError::SymbolNotFound("oscore2coap".to_string());
        assert_eq!(err.to_string(), "no resolvable entry address for function \"oscore2coap\"");
    }

    #[test]
    fn test_load_error_display() {
        let err = ControlError::Load {
            path: PathBuf::from("/tmp/zephyr.elf"),
            reason: "not an ELF image".to_string(),
        };
        assert!(err.to_string().contains("/tmp/zephyr.elf"));
        assert!(err.to_string().contains("not an ELF image"));
    }
}
