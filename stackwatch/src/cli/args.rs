//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::domain::{StackGrowth, TargetFunction};

#[derive(Parser)]
#[command(
    name = "stackwatch",
    about = "Measure the stack high-water mark of functions in a compiled program",
    after_help = "\
EXAMPLES:
    stackwatch ./zephyr.elf -f coap2oscore=1500 -f oscore2coap=1500
    stackwatch ./app -f edhoc_initiator_run=7000 --report build_reports/stack_report.html
    stackwatch ./app -f worker=4096 --export records.json -- --input trace.bin"
)]
pub struct Args {
    /// Path to the debuggable executable image
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Function to measure, as NAME=MAX_STACK_BYTES (repeatable). The byte
    /// budget sizes the captured stack window and must exceed the
    /// function's true usage.
    #[arg(
        short = 'f',
        long = "function",
        value_name = "NAME=BYTES",
        required = true,
        value_parser = parse_function_spec
    )]
    pub functions: Vec<TargetFunction>,

    /// Append the HTML report fragment to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Free-text note of the build configuration flags, recorded in the report
    #[arg(long, value_name = "FLAGS", default_value = "")]
    pub build_flags: String,

    /// Export the record table as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Direction the target's stack grows in (never auto-detected)
    #[arg(long, value_name = "DIR", default_value = "down", value_parser = parse_stack_growth)]
    pub stack_growth: StackGrowth,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Arguments passed through to the debuggee
    #[arg(last = true, value_name = "ARGS")]
    pub debuggee_args: Vec<String>,
}

fn parse_function_spec(spec: &str) -> Result<TargetFunction, String> {
    let Some((name, bytes)) = spec.split_once('=') else {
        return Err(format!("expected NAME=BYTES, got \"{spec}\""));
    };
    if name.is_empty() {
        return Err("function name must not be empty".to_string());
    }
    let max_stack_bytes: usize =
        bytes.parse().map_err(|_| format!("invalid byte count \"{bytes}\""))?;
    if max_stack_bytes == 0 {
        return Err("stack budget must be a positive byte count".to_string());
    }
    Ok(TargetFunction::new(name, max_stack_bytes))
}

fn parse_stack_growth(dir: &str) -> Result<StackGrowth, String> {
    match dir {
        "down" => Ok(StackGrowth::Down),
        "up" => Ok(StackGrowth::Up),
        other => Err(format!("expected \"down\" or \"up\", got \"{other}\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_spec_parsing() {
        let args =
            Args::try_parse_from(["stackwatch", "app.elf", "-f", "coap2oscore=1500"]).unwrap();
        assert_eq!(args.functions, vec![TargetFunction::new("coap2oscore", 1500)]);
        assert_eq!(args.stack_growth, StackGrowth::Down);
    }

    #[test]
    fn test_multiple_functions_keep_order() {
        let args = Args::try_parse_from([
            "stackwatch",
            "app.elf",
            "-f",
            "edhoc_responder_run=7000",
            "-f",
            "edhoc_initiator_run=7000",
        ])
        .unwrap();
        let names: Vec<&str> = args.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["edhoc_responder_run", "edhoc_initiator_run"]);
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(Args::try_parse_from(["stackwatch", "app.elf", "-f", "f=0"]).is_err());
    }

    #[test]
    fn test_malformed_spec_rejected() {
        assert!(Args::try_parse_from(["stackwatch", "app.elf", "-f", "no-equals"]).is_err());
        assert!(Args::try_parse_from(["stackwatch", "app.elf", "-f", "=123"]).is_err());
        assert!(Args::try_parse_from(["stackwatch", "app.elf", "-f", "f=abc"]).is_err());
    }

    #[test]
    fn test_at_least_one_function_required() {
        assert!(Args::try_parse_from(["stackwatch", "app.elf"]).is_err());
    }

    #[test]
    fn test_debuggee_args_after_separator() {
        let args = Args::try_parse_from([
            "stackwatch", "app.elf", "-f", "f=64", "--", "--input", "trace.bin",
        ])
        .unwrap();
        assert_eq!(args.debuggee_args, vec!["--input", "trace.bin"]);
    }

    #[test]
    fn test_stack_growth_up() {
        let args =
            Args::try_parse_from(["stackwatch", "app.elf", "-f", "f=64", "--stack-growth", "up"])
                .unwrap();
        assert_eq!(args.stack_growth, StackGrowth::Up);
    }
}
