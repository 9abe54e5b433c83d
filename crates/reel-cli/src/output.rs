//! Output formatting for CLI

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Format rows based on selected format; `text` renders each row with `line`
pub fn format_rows<T, F>(rows: &[T], format: &str, line: F) -> String
where
    T: Serialize + Tabled,
    F: Fn(&T) -> String,
{
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Table => Table::new(rows).with(Style::rounded()).to_string(),
        OutputFormat::Text => rows.iter().map(line).collect::<Vec<_>>().join("\n"),
    }
}
