use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;

use super::*;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_snapshot() -> Snapshot {
    let at = day(2024, 4, 10).and_hms_opt(14, 5, 30).unwrap();
    let mut entry = ChangeLogEntry::new(at, "123AB", LogOperation::Create, "Ana")
        .study("BE-001")
        .reason("novo apontamento");
    entry
        .extra
        .insert("email".to_string(), FieldValue::from("ana@example.com"));

    Snapshot {
        columns: vec![
            "ID".to_string(),
            "Código do Estudo".to_string(),
            "Prazo Para Resolução".to_string(),
            "Tempo de casa".to_string(),
            "Coluna Futura".to_string(),
        ],
        records: vec![
            Record::with_id("123AB")
                .with("Código do Estudo", "BE-001")
                .with("Prazo Para Resolução", day(2024, 5, 1))
                .with("Tempo de casa", 3.5)
                .with("Coluna Futura", "mantida"),
            Record::with_id("9Z8Y7").with("Código do Estudo", "BE-002"),
        ],
        log: vec![entry],
    }
}

#[test]
fn encode_then_decode_preserves_records_log_and_unknown_columns() {
    let snapshot = sample_snapshot();
    let bytes = encode(&snapshot).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded.columns, snapshot.columns);
    assert_eq!(decoded.records.len(), 2);

    let first = &decoded.records[0];
    assert_eq!(first.id().as_deref(), Some("123AB"));
    assert_eq!(
        first.get("Prazo Para Resolução"),
        Some(&FieldValue::Date(day(2024, 5, 1)))
    );
    assert_eq!(first.get("Tempo de casa"), Some(&FieldValue::Number(3.5)));
    assert_eq!(first.get("Coluna Futura"), Some(&FieldValue::from("mantida")));

    // Cells never written decode as empty, not as missing fields.
    let second = &decoded.records[1];
    assert_eq!(second.get("Coluna Futura"), Some(&FieldValue::Empty));

    assert_eq!(decoded.log, snapshot.log);
}

#[test]
fn record_fields_missing_from_schema_are_still_written() {
    let mut snapshot = sample_snapshot();
    snapshot.records[1].set("Plantão", "Noturno");

    let decoded = decode(&encode(&snapshot).unwrap()).unwrap();
    assert_eq!(decoded.columns.last().map(String::as_str), Some("Plantão"));
    assert_eq!(
        decoded.records[1].get("Plantão"),
        Some(&FieldValue::from("Noturno"))
    );
}

#[test]
fn missing_log_sheet_yields_empty_log() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(RECORDS_SHEET).unwrap();
    sheet.write_string(0, 0, "ID").unwrap();
    sheet.write_string(0, 1, "Status").unwrap();
    sheet.write_string(1, 0, "001AB").unwrap();
    sheet.write_string(1, 1, "PENDENTE").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let decoded = decode(&bytes).unwrap();
    assert!(decoded.log.is_empty());
    assert_eq!(decoded.records.len(), 1);
    assert_eq!(decoded.records[0].text("Status").as_deref(), Some("PENDENTE"));
}

#[test]
fn missing_records_sheet_yields_empty_records() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Planilha1").unwrap();
    sheet.write_string(0, 0, "qualquer coisa").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let decoded = decode(&bytes).unwrap();
    assert!(decoded.records.is_empty());
    assert!(decoded.columns.is_empty());
    assert!(decoded.log.is_empty());
}

#[test]
fn duplicate_and_blank_headers_keep_their_data() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(RECORDS_SHEET).unwrap();
    sheet.write_string(0, 0, "ID").unwrap();
    sheet.write_string(0, 1, "Status").unwrap();
    sheet.write_string(0, 2, "Status").unwrap();
    sheet.write_string(1, 0, "001AB").unwrap();
    sheet.write_string(1, 1, "PENDENTE").unwrap();
    sheet.write_string(1, 2, "REALIZADO").unwrap();
    sheet.write_string(1, 3, "sem cabeçalho").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.columns, vec!["ID", "Status", "Status.1", "Unnamed: 3"]);
    assert_eq!(
        decoded.records[0].get("Unnamed: 3"),
        Some(&FieldValue::from("sem cabeçalho"))
    );
}

#[test]
fn blank_rows_are_skipped() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(RECORDS_SHEET).unwrap();
    sheet.write_string(0, 0, "ID").unwrap();
    sheet.write_string(1, 0, "001AB").unwrap();
    sheet.write_string(3, 0, "002CD").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let decoded = decode(&bytes).unwrap();
    let ids: Vec<String> = decoded.records.iter().filter_map(Record::id).collect();
    assert_eq!(ids, vec!["001AB", "002CD"]);
}

#[test]
fn garbage_bytes_are_malformed() {
    let err = decode(b"definitely not a zip archive").unwrap_err();
    assert!(matches!(err, CodecError::Malformed(_)));
}
