use apontar_core::{Record, Status};

use crate::commands::common::{format_record_lines, load_snapshot, Workbook};
use crate::error::CliError;

pub async fn run_list(
    status: Option<Status>,
    limit: usize,
    as_json: bool,
    workbook: &Workbook,
) -> Result<(), CliError> {
    let snapshot = load_snapshot(workbook).await?;
    let records = select_records(&snapshot.records, status, limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("No findings.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Newest first, optionally filtered by status.
pub fn select_records(records: &[Record], status: Option<Status>, limit: usize) -> Vec<&Record> {
    records
        .iter()
        .rev()
        .filter(|record| match status {
            None => true,
            Some(wanted) => matches!(record.status(), Some(Ok(found)) if found == wanted),
        })
        .take(limit)
        .collect()
}
