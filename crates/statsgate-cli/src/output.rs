//! Terminal output
//!
//! Commands print through an [`OutputFormatter`] so the same code path
//! serves both human and `--json` output. Human output goes to stdout with
//! status glyphs; diagnostics go to stderr in both modes.

use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    /// `quiet` keeps headings and warnings but drops detail lines
    Human { quiet: bool },
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    /// Indented detail line
    fn info(&self, message: &str);
    /// Labelled value, aligned under the previous heading
    fn field(&self, label: &str, value: &str);
    fn print_json(&self, value: &Value);
}

pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {message}");
        }
    }
    fn field(&self, label: &str, value: &str) {
        if !self.quiet {
            println!("  {:<14} {value}", format!("{label}:"));
        }
    }
    fn print_json(&self, _value: &Value) {}
}

/// One JSON document per result on stdout; status lines on stderr.
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, _message: &str) {}
    fn error(&self, message: &str) {
        eprintln!("{}", json!({"level": "error", "message": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn field(&self, _label: &str, _value: &str) {}
    fn print_json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => self.error(&format!("Failed to encode output: {e}")),
        }
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human { quiet } => Box::new(HumanFormatter { quiet }),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
