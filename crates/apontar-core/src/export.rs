//! Record export helpers shared by the CLI commands.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Record, Snapshot};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Render records as a pretty-printed JSON array of objects.
pub fn render_json_export(records: &[Record]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Render records as a Markdown table.
///
/// Columns follow `columns`, then any field a record carries beyond it.
#[must_use]
pub fn render_markdown_export(columns: &[String], records: &[Record]) -> String {
    let mut header: Vec<&str> = columns.iter().map(String::as_str).collect();
    for record in records {
        for (name, _) in record.fields() {
            if !header.contains(&name) {
                header.push(name);
            }
        }
    }

    let mut output = String::new();
    if header.is_empty() {
        return output;
    }

    let _ = writeln!(
        output,
        "| {} |",
        header.iter().map(|name| escape_cell(name)).collect::<Vec<_>>().join(" | ")
    );
    let _ = writeln!(output, "|{}", " --- |".repeat(header.len()));
    for record in records {
        let cells: Vec<String> = header
            .iter()
            .map(|name| {
                record
                    .get(name)
                    .map(|value| escape_cell(&value.to_string()))
                    .unwrap_or_default()
            })
            .collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }

    output
}

/// Render a snapshot's records in the selected format.
pub fn render_records_export(snapshot: &Snapshot, format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(&snapshot.records),
        ExportFormat::Markdown => Ok(render_markdown_export(&snapshot.columns, &snapshot.records)),
    }
}

/// Default file name for an export taken at `at`.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, at: NaiveDateTime) -> String {
    format!(
        "apontamentos-{}.{}",
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

fn escape_cell(text: &str) -> String {
    text.trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{columns, FieldValue};

    fn records() -> Vec<Record> {
        vec![
            Record::with_id("123AB")
                .with(columns::STUDY, "EST-01")
                .with(columns::RAISED_ON, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
            Record::with_id("456CD")
                .with(columns::STUDY, "EST-02")
                .with(columns::FINDING, "assinatura | rubrica\nausente"),
        ]
    }

    #[test]
    fn markdown_table_lists_schema_then_extra_fields() {
        let schema = vec![columns::ID.to_string(), columns::STUDY.to_string()];
        let rendered = render_markdown_export(&schema, &records());
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(
            lines[0],
            "| ID | Código do Estudo | Data do Apontamento | Apontamento |"
        );
        assert_eq!(lines[1], "| --- | --- | --- | --- |");
        assert_eq!(lines[2], "| 123AB | EST-01 | 05/01/2024 |  |");
        assert_eq!(
            lines[3],
            "| 456CD | EST-02 |  | assinatura \\| rubrica<br>ausente |"
        );
    }

    #[test]
    fn markdown_of_nothing_is_empty() {
        assert_eq!(render_markdown_export(&[], &[]), "");
    }

    #[test]
    fn json_export_keeps_field_order() {
        let record = Record::with_id("123AB")
            .with(columns::STATUS, "PENDENTE")
            .with(columns::SHIFT, FieldValue::Empty);
        let rendered = render_json_export(&[record]).unwrap();

        let id = rendered.find("\"ID\"").unwrap();
        let status = rendered.find("\"Status\"").unwrap();
        assert!(id < status);
        assert!(rendered.contains("\"PENDENTE\""));
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, at),
            "apontamentos-20240309-070809.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, at),
            "apontamentos-20240309-070809.md"
        );
    }
}
