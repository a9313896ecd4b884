use std::path::Path;

use apontar_core::export::{render_records_export, suggested_export_file_name};
use apontar_core::{Snapshot, Status};
use chrono::Local;

use crate::cli::ExportFormat;
use crate::commands::common::{load_snapshot, output_target, Workbook};
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    status: Option<Status>,
    output_path: Option<&Path>,
    workbook: &Workbook,
) -> Result<(), CliError> {
    let snapshot = load_snapshot(workbook).await?;
    let selection = select_for_export(&snapshot, status);
    let rendered = render_records_export(&selection, format.into())?;

    match output_path {
        Some(path) => {
            let target = output_target(path, || {
                suggested_export_file_name(format.into(), Local::now().naive_local())
            });
            std::fs::write(&target, rendered)?;
            eprintln!("Exported {} finding(s)", selection.len());
            println!("{}", target.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

/// The snapshot's columns and the records to export, in workbook order.
pub fn select_for_export(snapshot: &Snapshot, status: Option<Status>) -> Snapshot {
    let records = snapshot
        .records
        .iter()
        .filter(|record| match status {
            None => true,
            Some(wanted) => matches!(record.status(), Some(Ok(found)) if found == wanted),
        })
        .cloned()
        .collect();

    Snapshot {
        columns: snapshot.columns.clone(),
        records,
        log: Vec::new(),
    }
}
