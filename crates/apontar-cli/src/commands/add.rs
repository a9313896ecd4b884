use apontar_core::ids::IdAllocator;
use apontar_core::models::columns;
use apontar_core::validation::{find_duplicate, validate_new_record};
use apontar_core::{FieldValue, Record, RecordId, Study, StudyCatalog};
use chrono::{Local, NaiveDate};

use crate::cli::AddArgs;
use crate::commands::common::{
    apply_assignments, load_snapshot, lookup_study, print_warnings, Workbook,
};
use crate::error::CliError;

pub async fn run_add(
    args: &AddArgs,
    actor: &str,
    workbook: &Workbook,
    catalog: Option<&StudyCatalog>,
) -> Result<(), CliError> {
    let study = lookup_study(catalog, &args.study)?;
    let snapshot = load_snapshot(workbook).await?;
    let id = IdAllocator::from_snapshot(&snapshot).allocate()?;
    let record = build_new_record(args, &id, study, Local::now().date_naive())?;
    validate_new_record(&record)?;

    if !args.allow_duplicate {
        if let Some(existing) = find_duplicate(&snapshot, &record) {
            return Err(CliError::Duplicate {
                id: existing.id().unwrap_or_default(),
                raised_on: existing.text(columns::RAISED_ON).unwrap_or_default(),
            });
        }
    }

    let outcome = workbook.apply(&[record], actor, "").await?;
    print_warnings(&outcome);
    println!("{id}");
    Ok(())
}

/// Assemble the row for a new finding, in the workbook's column order.
///
/// A catalog `study` supplies the code as listed and the study name.
pub fn build_new_record(
    args: &AddArgs,
    id: &RecordId,
    study: Option<&Study>,
    today: NaiveDate,
) -> Result<Record, CliError> {
    let optional = |value: &Option<String>| {
        value
            .as_deref()
            .map_or(FieldValue::Empty, FieldValue::parse_input)
    };
    let (study_code, research_name) = match study {
        Some(study) => (
            FieldValue::parse_input(&study.code),
            FieldValue::parse_input(&study.name),
        ),
        None => (
            FieldValue::parse_input(&args.study),
            optional(&args.research_name),
        ),
    };

    let mut record = Record::with_id(id)
        .with(columns::STUDY, study_code)
        .with(columns::RESEARCH_NAME, research_name)
        .with(columns::RAISED_ON, today)
        .with(columns::RAISED_BY, FieldValue::parse_input(&args.responsible))
        .with(columns::ORIGIN, optional(&args.origin))
        .with(columns::DOCUMENT, FieldValue::parse_input(&args.document))
        .with(columns::PARTICIPANT, FieldValue::parse_input(&args.participant))
        .with(columns::PERIOD, optional(&args.period))
        .with(columns::CRITICALITY, optional(&args.criticality))
        .with(columns::DEADLINE, optional(&args.deadline))
        .with(columns::FINDING, FieldValue::parse_input(&args.finding))
        .with(columns::STATUS, args.status.as_str())
        .with(columns::VERIFIER, optional(&args.verifier))
        .with(columns::VERIFIED_ON, optional(&args.verified_on))
        .with(columns::JUSTIFICATION, optional(&args.justification))
        .with(columns::RESOLVED_ON, optional(&args.resolved_on))
        .with(columns::CORRECTED_BY, FieldValue::Empty)
        .with(columns::SHIFT, FieldValue::Empty)
        .with(columns::DEPARTMENT, FieldValue::Empty)
        .with(columns::TENURE, FieldValue::Empty);
    apply_assignments(&mut record, &args.assignments)?;
    Ok(record)
}
