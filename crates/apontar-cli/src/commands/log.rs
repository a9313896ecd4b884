use apontar_core::ChangeLogEntry;

use crate::commands::common::{format_log_lines, load_snapshot, Workbook};
use crate::error::CliError;

pub async fn run_log(
    id: Option<&str>,
    limit: usize,
    as_json: bool,
    workbook: &Workbook,
) -> Result<(), CliError> {
    let snapshot = load_snapshot(workbook).await?;
    let entries = select_entries(&snapshot.log, id, limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for line in format_log_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Newest first, optionally only one finding's history.
pub fn select_entries<'a>(
    log: &'a [ChangeLogEntry],
    id: Option<&str>,
    limit: usize,
) -> Vec<&'a ChangeLogEntry> {
    let id = id.map(|id| id.trim().to_ascii_uppercase());
    log.iter()
        .rev()
        .filter(|entry| id.as_deref().map_or(true, |id| entry.record_id == id))
        .take(limit)
        .collect()
}
