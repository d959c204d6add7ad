//! Text rendering of result sets for the `table` and `markdown` outputs.

use crate::models::JsonRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Cells wider than this are cut and suffixed with `...` in ASCII tables.
const MAX_CELL_WIDTH: usize = 60;

/// Output format for row-returning tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured rows (default)
    #[default]
    Json,
    /// ASCII table, psql style
    Table,
    /// Markdown table
    Markdown,
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        nested => nested.to_string(),
    }
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > max.saturating_sub(3) {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push_str("...");
    out
}

fn display_cell(value: &JsonValue) -> String {
    let flat = format_value(value).replace(['\n', '\r'], " ");
    truncate_to_width(&flat, MAX_CELL_WIDTH)
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right_align {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

/// Render rows as an ASCII table with a row-count footer.
pub fn format_as_table(columns: &[String], rows: &[JsonRow], execution_time_ms: u64) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let cells: Vec<Vec<(String, bool)>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|name| {
                    let value = row.get(name).unwrap_or(&JsonValue::Null);
                    (display_cell(value), value.is_number())
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in &cells {
        for (i, (text, _)) in row.iter().enumerate() {
            widths[i] = widths[i].max(text.width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = separator.clone();
    for (name, w) in columns.iter().zip(&widths) {
        output.push_str(&format!("| {} ", pad(name, *w, false)));
    }
    output.push_str("|\n");
    output.push_str(&separator);

    for row in &cells {
        for ((text, numeric), w) in row.iter().zip(&widths) {
            output.push_str(&format!("| {} ", pad(text, *w, *numeric)));
        }
        output.push_str("|\n");
    }
    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "({} {}, {:.2} sec)\n",
        rows.len(),
        row_text,
        execution_time_ms as f64 / 1000.0
    ));
    output
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render rows as a Markdown table.
pub fn format_as_markdown(columns: &[String], rows: &[JsonRow]) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();
    for name in columns {
        output.push_str(&format!("| {} ", markdown_cell(name)));
    }
    output.push_str("|\n");
    output.push_str(&"|---".repeat(columns.len()));
    output.push_str("|\n");

    for row in rows {
        for name in columns {
            let value = row.get(name).unwrap_or(&JsonValue::Null);
            output.push_str(&format!("| {} ", markdown_cell(&format_value(value))));
        }
        output.push_str("|\n");
    }

    output.push_str(&format!("\n*{} rows*", rows.len()));
    output
}
