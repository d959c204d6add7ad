//! Export serialization formats and their framing.
//!
//! - `jsonl`: one JSON object per line.
//! - `json`: a single array. `[\n` opens it, rows are separated by `,\n`
//!   within and across batches, `\n]` closes it on success only.
//! - `csv`: a header derived from the first batch's field names, written
//!   once, then data rows. Strings and nested values are always quoted.

use crate::models::JsonRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Jsonl,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Stateful encoder for one export. Tracks whether the CSV header and the
/// first JSON array element have been written.
#[derive(Debug)]
pub struct RowEncoder {
    format: ExportFormat,
    header: Option<Vec<String>>,
    rows_encoded: u64,
}

impl RowEncoder {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            header: None,
            rows_encoded: 0,
        }
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Bytes written before the first batch.
    pub fn open(&self) -> &'static [u8] {
        match self.format {
            ExportFormat::Json => b"[\n",
            ExportFormat::Jsonl | ExportFormat::Csv => b"",
        }
    }

    /// Bytes written after the last batch of a successful export.
    pub fn close(&self) -> &'static [u8] {
        match self.format {
            ExportFormat::Json => b"\n]",
            ExportFormat::Jsonl | ExportFormat::Csv => b"",
        }
    }

    /// Encode one batch. `columns` is the batch's field order; the CSV header
    /// is taken from the first non-empty batch and reused afterwards.
    pub fn encode_batch(&mut self, columns: &[String], rows: &[JsonRow]) -> Vec<u8> {
        let mut out = String::new();
        match self.format {
            ExportFormat::Json => {
                for row in rows {
                    if self.rows_encoded > 0 {
                        out.push_str(",\n");
                    }
                    out.push_str(&JsonValue::Object(row.clone()).to_string());
                    self.rows_encoded += 1;
                }
            }
            ExportFormat::Jsonl => {
                for row in rows {
                    out.push_str(&JsonValue::Object(row.clone()).to_string());
                    out.push('\n');
                    self.rows_encoded += 1;
                }
            }
            ExportFormat::Csv => {
                if rows.is_empty() {
                    return Vec::new();
                }
                let header = self.header.get_or_insert_with(|| {
                    let names = columns.to_vec();
                    out.push_str(&csv_line(names.iter().map(|n| csv_header_field(n))));
                    names
                });
                for row in rows {
                    out.push_str(&csv_line(
                        header.iter().map(|name| csv_field(row.get(name))),
                    ));
                }
                self.rows_encoded += rows.len() as u64;
            }
        }
        out.into_bytes()
    }
}

fn csv_line(fields: impl Iterator<Item = String>) -> String {
    let mut line = fields.collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn csv_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn csv_header_field(name: &str) -> String {
    if name.contains([',', '"', '\n', '\r']) {
        csv_quote(name)
    } else {
        name.to_string()
    }
}

fn csv_field(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::Bool(b)) => b.to_string(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::String(s)) => csv_quote(s),
        Some(nested) => csv_quote(&nested.to_string()),
    }
}
