use apontar_core::models::columns;
use apontar_core::validation::{stamp_status_change, validate_status_requirements};
use apontar_core::{Record, Status};
use chrono::{Local, NaiveDateTime};

use crate::commands::common::{apply_assignments, load_snapshot, print_warnings, Workbook};
use crate::error::CliError;

pub async fn run_update(
    id: &str,
    status: Option<Status>,
    assignments: &[(String, String)],
    reason: &str,
    actor: &str,
    workbook: &Workbook,
) -> Result<(), CliError> {
    let id = id.trim().to_ascii_uppercase();
    let snapshot = load_snapshot(workbook).await?;
    let existing = snapshot
        .find(&id)
        .ok_or_else(|| CliError::RecordNotFound(id.clone()))?;

    let incoming = build_update(
        existing,
        &id,
        status,
        assignments,
        actor,
        Local::now().naive_local(),
    )?;

    let outcome = workbook.apply(&[incoming], actor, reason).await?;
    print_warnings(&outcome);
    if outcome.updated.is_empty() {
        println!("No changes for {id}");
    } else {
        println!("Updated {id}");
    }
    Ok(())
}

/// The partial record sent to the reconciler for an edit.
///
/// Status rules are checked against the record as it will look after the
/// edit, so a companion field already present in the workbook counts.
pub fn build_update(
    existing: &Record,
    id: &str,
    status: Option<Status>,
    assignments: &[(String, String)],
    actor: &str,
    at: NaiveDateTime,
) -> Result<Record, CliError> {
    if status.is_none() && assignments.is_empty() {
        return Err(CliError::NothingToUpdate);
    }

    let mut incoming = Record::with_id(id);
    if let Some(status) = status {
        incoming.set(columns::STATUS, status.as_str());
    }
    apply_assignments(&mut incoming, assignments)?;

    let mut preview = existing.clone();
    for (name, value) in incoming.fields() {
        preview.set(name, value.clone());
    }
    validate_status_requirements(&preview)?;

    stamp_status_change(&mut incoming, Some(existing), actor, at);
    Ok(incoming)
}
