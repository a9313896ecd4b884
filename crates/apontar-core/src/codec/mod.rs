//! Workbook codec.
//!
//! A store is one `.xlsx` workbook with two sheets: `apontamentos`, one row
//! per record under a header row of column names, and `log`, the audit
//! trail. Columns this revision does not know about are carried through
//! untouched so older and newer revisions of the form can share a file.

mod serial;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use crate::models::{ChangeLogEntry, FieldValue, LogOperation, Record, Snapshot, LOG_COLUMNS};

pub use serial::{date_to_serial, datetime_to_serial, serial_to_value};

pub const RECORDS_SHEET: &str = "apontamentos";
pub const LOG_SHEET: &str = "log";

const DATE_NUM_FORMAT: &str = "dd/mm/yyyy";
const DATETIME_NUM_FORMAT: &str = "dd/mm/yyyy hh:mm:ss";

/// Errors raised while reading or writing a workbook.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes are not a readable workbook
    #[error("Malformed workbook: {0}")]
    Malformed(String),

    /// The workbook writer rejected the content
    #[error("Failed to encode workbook: {0}")]
    Encode(#[from] XlsxError),

    /// The snapshot does not fit the sheet limits
    #[error("Workbook too large: {0}")]
    TooLarge(String),
}

/// Decode a workbook into a snapshot.
///
/// A missing `apontamentos` sheet yields no records and a missing `log`
/// sheet yields an empty log.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|error| CodecError::Malformed(error.to_string()))?;
    let sheet_names = workbook.sheet_names();

    let mut snapshot = Snapshot::default();

    if sheet_names.iter().any(|name| name == RECORDS_SHEET) {
        let range = workbook
            .worksheet_range(RECORDS_SHEET)
            .map_err(|error| CodecError::Malformed(error.to_string()))?;
        let (columns, records) = decode_records(&range);
        snapshot.columns = columns;
        snapshot.records = records;
    }

    if sheet_names.iter().any(|name| name == LOG_SHEET) {
        let range = workbook
            .worksheet_range(LOG_SHEET)
            .map_err(|error| CodecError::Malformed(error.to_string()))?;
        snapshot.log = decode_log(&range);
    }

    Ok(snapshot)
}

/// Encode a snapshot into workbook bytes.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    let formats = CellFormats::new();
    let mut workbook = Workbook::new();

    let columns = effective_columns(snapshot);
    let records_sheet = workbook.add_worksheet();
    records_sheet.set_name(RECORDS_SHEET)?;
    write_header(records_sheet, &columns, &formats)?;
    for (index, record) in snapshot.records.iter().enumerate() {
        let row = row_index(index + 1)?;
        for (col, name) in columns.iter().enumerate() {
            if let Some(value) = record.get(name) {
                write_cell(records_sheet, row, col_index(col)?, value, &formats)?;
            }
        }
    }

    let extra_columns: Vec<String> = snapshot
        .log
        .iter()
        .flat_map(|entry| entry.extra.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let log_header: Vec<String> = LOG_COLUMNS
        .iter()
        .map(ToString::to_string)
        .chain(extra_columns.iter().cloned())
        .collect();

    let log_sheet = workbook.add_worksheet();
    log_sheet.set_name(LOG_SHEET)?;
    write_header(log_sheet, &log_header, &formats)?;
    for (index, entry) in snapshot.log.iter().enumerate() {
        let row = row_index(index + 1)?;
        for (col, value) in entry.standard_cells().iter().enumerate() {
            write_cell(log_sheet, row, col_index(col)?, value, &formats)?;
        }
        for (offset, name) in extra_columns.iter().enumerate() {
            if let Some(value) = entry.extra.get(name) {
                let col = col_index(LOG_COLUMNS.len() + offset)?;
                write_cell(log_sheet, row, col, value, &formats)?;
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Schema columns followed by any field a record carries that the schema lacks.
fn effective_columns(snapshot: &Snapshot) -> Vec<String> {
    let mut columns = snapshot.columns.clone();
    for record in &snapshot.records {
        for (name, _) in record.fields() {
            if !columns.iter().any(|column| column == name) {
                columns.push(name.to_string());
            }
        }
    }
    columns
}

fn decode_records(range: &Range<Data>) -> (Vec<String>, Vec<Record>) {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return (Vec::new(), Vec::new());
    };
    let data_rows: Vec<&[Data]> = rows.collect();
    let header = resolve_header(header_row, &data_rows);

    let records = data_rows
        .iter()
        .filter(|row| !row_is_blank(row))
        .map(|row| {
            let mut record = Record::new();
            for (col, name) in &header {
                let value = row.get(*col).map_or(FieldValue::Empty, cell_value);
                record.set(name.clone(), value);
            }
            record
        })
        .collect();

    let columns = header.into_iter().map(|(_, name)| name).collect();
    (columns, records)
}

fn decode_log(range: &Range<Data>) -> Vec<ChangeLogEntry> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let data_rows: Vec<&[Data]> = rows.collect();
    let header = resolve_header(header_row, &data_rows);
    let positions: HashMap<&str, usize> = header
        .iter()
        .map(|(col, name)| (name.as_str(), *col))
        .collect();

    data_rows
        .iter()
        .filter(|row| !row_is_blank(row))
        .map(|row| {
            let cell = |name: &str| {
                positions
                    .get(name)
                    .and_then(|col| row.get(*col))
                    .map_or(FieldValue::Empty, cell_value)
            };
            let text = |name: &str| cell(name).non_blank_text().unwrap_or_default();

            let extra: BTreeMap<String, FieldValue> = header
                .iter()
                .filter(|(_, name)| !LOG_COLUMNS.contains(&name.as_str()))
                .map(|(col, name)| {
                    let value = row.get(*col).map_or(FieldValue::Empty, cell_value);
                    (name.clone(), value)
                })
                .filter(|(_, value)| !value.is_blank())
                .collect();

            ChangeLogEntry {
                timestamp: cell("timestamp"),
                record_id: text("record_id"),
                study: text("study"),
                operation: LogOperation::parse(&text("operation")),
                field: text("field"),
                old_value: text("old_value"),
                new_value: text("new_value"),
                actor: text("actor"),
                reason: text("reason"),
                extra,
            }
        })
        .collect()
}

/// Map header cells to column names.
///
/// Repeated names get a `.N` suffix and blank header cells above data are
/// named `Unnamed: N`, so no cell content is lost on the way back out.
fn resolve_header(header_row: &[Data], data_rows: &[&[Data]]) -> Vec<(usize, String)> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut header = Vec::new();

    for (col, cell) in header_row.iter().enumerate() {
        let name = match cell_value(cell).non_blank_text() {
            Some(name) => name,
            None => {
                let has_data = data_rows
                    .iter()
                    .any(|row| row.get(col).is_some_and(|cell| !cell_value(cell).is_blank()));
                if !has_data {
                    continue;
                }
                format!("Unnamed: {col}")
            }
        };

        let count = seen.entry(name.clone()).or_insert(0);
        let unique = if *count == 0 {
            name
        } else {
            format!("{name}.{count}")
        };
        *count += 1;
        header.push((col, unique));
    }

    header
}

fn row_is_blank(row: &[Data]) -> bool {
    row.iter().all(|cell| cell_value(cell).is_blank())
}

#[allow(clippy::cast_precision_loss)]
fn cell_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Empty => FieldValue::Empty,
        Data::String(text) => FieldValue::Text(text.clone()),
        Data::Float(number) => FieldValue::Number(*number),
        Data::Int(number) => FieldValue::Number(*number as f64),
        Data::Bool(value) => FieldValue::Bool(*value),
        Data::DateTime(datetime) => serial_to_value(datetime.as_f64()),
        Data::DateTimeIso(text) => serial::parse_iso(text),
        other => FieldValue::Text(other.to_string()),
    }
}

struct CellFormats {
    header: Format,
    date: Format,
    datetime: Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            date: Format::new().set_num_format(DATE_NUM_FORMAT),
            datetime: Format::new().set_num_format(DATETIME_NUM_FORMAT),
        }
    }
}

fn write_header(
    sheet: &mut Worksheet,
    names: &[String],
    formats: &CellFormats,
) -> Result<(), CodecError> {
    for (col, name) in names.iter().enumerate() {
        sheet.write_string_with_format(0, col_index(col)?, name, &formats.header)?;
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &FieldValue,
    formats: &CellFormats,
) -> Result<(), CodecError> {
    match value {
        FieldValue::Empty => {}
        FieldValue::Text(text) if text.is_empty() => {}
        FieldValue::Number(number) if number.is_nan() => {}
        FieldValue::Text(text) => {
            sheet.write_string(row, col, text)?;
        }
        FieldValue::Number(number) => {
            sheet.write_number(row, col, *number)?;
        }
        FieldValue::Bool(value) => {
            sheet.write_boolean(row, col, *value)?;
        }
        FieldValue::Date(date) => {
            sheet.write_number_with_format(row, col, date_to_serial(*date), &formats.date)?;
        }
        FieldValue::DateTime(datetime) => {
            let serial = datetime_to_serial(*datetime);
            sheet.write_number_with_format(row, col, serial, &formats.datetime)?;
        }
    }
    Ok(())
}

fn row_index(index: usize) -> Result<u32, CodecError> {
    u32::try_from(index).map_err(|_| CodecError::TooLarge(format!("row {index}")))
}

fn col_index(index: usize) -> Result<u16, CodecError> {
    u16::try_from(index).map_err(|_| CodecError::TooLarge(format!("column {index}")))
}

#[cfg(test)]
mod tests;
