//! Output formatting for statement reports
//!
//! Every statement produces one JSON value:
//! - Compact JSON (single line) for piping and logging
//! - Pretty-printed JSON with configurable indentation
//! - Optional color highlighting, applied to pretty output only
//!
//! A statement chained with `.pretty()` is always pretty-printed.

use colored_json::prelude::*;
use serde_json::Value;

use crate::config::{DisplayConfig, OutputFormat};
use crate::error::Result;
use crate::executor::StatementReport;

/// JSON formatter for statement reports
pub struct Formatter {
    /// Enable pretty printing
    pretty: bool,

    /// Indentation width
    indent: usize,

    /// Enable colored output
    use_colors: bool,
}

impl Formatter {
    /// Create a new formatter
    ///
    /// # Arguments
    /// * `pretty` - Enable pretty printing
    /// * `use_colors` - Enable colored output
    /// * `indent` - Indentation width for pretty output
    pub fn new(pretty: bool, use_colors: bool, indent: usize) -> Self {
        Self {
            pretty,
            indent,
            use_colors,
        }
    }

    /// Create a formatter from display configuration
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(
            config.format == OutputFormat::JsonPretty,
            config.color_output,
            config.indent,
        )
    }

    /// Format one statement report
    pub fn format_report(&self, report: &StatementReport) -> Result<String> {
        let force_pretty = report
            .descriptor
            .as_ref()
            .is_some_and(|d| d.options.pretty == Some(true));
        self.render(&report.to_json(), self.pretty || force_pretty)
    }

    /// Format all reports of a run, one JSON value per statement
    pub fn format_reports(&self, reports: &[StatementReport]) -> Result<String> {
        let rendered = reports
            .iter()
            .map(|report| self.format_report(report))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join("\n"))
    }

    /// Format an arbitrary JSON value
    pub fn format_value(&self, value: &Value) -> Result<String> {
        self.render(value, self.pretty)
    }

    fn render(&self, value: &Value, pretty: bool) -> Result<String> {
        let json_str = if pretty {
            self.to_pretty_string(value)?
        } else {
            serde_json::to_string(value)?
        };

        // Compact JSON stays plain for piping
        if self.use_colors && pretty {
            Ok(json_str.to_colored_json_auto().unwrap_or(json_str))
        } else {
            Ok(json_str)
        }
    }

    /// Serialize to pretty JSON with custom indentation
    fn to_pretty_string(&self, value: &Value) -> Result<String> {
        let mut buf = Vec::new();
        let indent = " ".repeat(self.indent.max(1));
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(value, &mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(true, false, 2)
    }
}
