use apontar_core::{Study, StudyCatalog};

use crate::commands::common::text_preview;
use crate::error::CliError;

pub fn run_studies(catalog: Option<&StudyCatalog>, as_json: bool) -> Result<(), CliError> {
    let catalog = catalog.ok_or(CliError::NoCatalog)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(catalog.studies())?);
    } else if catalog.is_empty() {
        println!("The study catalog is empty.");
    } else {
        for line in format_study_lines(catalog.studies()) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn format_study_lines(studies: &[Study]) -> Vec<String> {
    let width = studies
        .iter()
        .map(|study| study.code.chars().count())
        .max()
        .unwrap_or_default();
    studies
        .iter()
        .map(|study| {
            let name = text_preview(&study.name, 60);
            format!("{:<width$}  {name}", study.code)
        })
        .collect()
}
