use apontar_core::ids::IdAllocator;

use crate::commands::common::{load_snapshot, Workbook};
use crate::error::CliError;

pub async fn run_new_id(workbook: &Workbook) -> Result<(), CliError> {
    let snapshot = load_snapshot(workbook).await?;
    let id = IdAllocator::from_snapshot(&snapshot).allocate()?;
    println!("{id}");
    Ok(())
}
