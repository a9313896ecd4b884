//! Form rules applied before records are handed to the reconciler.

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::models::{columns, FieldValue, Record, RecordId, Snapshot, Status};

/// Fields every new finding must fill.
pub const REQUIRED_FIELDS: [&str; 4] = [
    columns::STUDY,
    columns::PARTICIPANT,
    columns::FINDING,
    columns::RAISED_BY,
];

/// Check a record about to be created: ID shape, required fields and the
/// status-dependent fields.
pub fn validate_new_record(record: &Record) -> Result<()> {
    let id = record
        .id()
        .ok_or_else(|| Error::InvalidInput("record has no ID".to_string()))?;
    RecordId::parse(&id)?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| record.text(field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "required fields are empty: {}",
            missing.join(", ")
        )));
    }

    validate_status_requirements(record)
}

/// Status values that need a companion field.
///
/// `VERIFICANDO` needs Verificador, `NÃO APLICÁVEL` needs Justificativa and
/// `REALIZADO` needs Data de Resolução. A blank status passes; unknown status
/// text does not.
pub fn validate_status_requirements(record: &Record) -> Result<()> {
    let status = match record.status() {
        None => return Ok(()),
        Some(Ok(status)) => status,
        Some(Err(error)) => return Err(Error::InvalidInput(error.to_string())),
    };

    let Some(field) = required_companion(status) else {
        return Ok(());
    };
    if record.text(field).is_none() {
        return Err(Error::InvalidInput(format!(
            "status '{status}' requires '{field}'"
        )));
    }
    Ok(())
}

/// The field a status cannot go without.
#[must_use]
pub const fn required_companion(status: Status) -> Option<&'static str> {
    match status {
        Status::Verifying => Some(columns::VERIFIER),
        Status::NotApplicable => Some(columns::JUSTIFICATION),
        Status::Done => Some(columns::RESOLVED_ON),
        Status::Pending | Status::DoneDuringConduct => None,
    }
}

/// An existing record raised for the same study, document and participant.
#[must_use]
pub fn find_duplicate<'a>(snapshot: &'a Snapshot, candidate: &Record) -> Option<&'a Record> {
    let key = duplicate_key(candidate);
    let candidate_id = candidate.id();
    snapshot
        .records
        .iter()
        .filter(|existing| candidate_id.is_none() || existing.id() != candidate_id)
        .find(|existing| duplicate_key(existing) == key)
}

fn duplicate_key(record: &Record) -> [Option<String>; 3] {
    [
        record.text(columns::STUDY),
        record.text(columns::DOCUMENT),
        record.text(columns::PARTICIPANT),
    ]
}

/// Stamp Atualização and Responsável Atualização when the status changed.
///
/// Returns whether the record was stamped.
pub fn stamp_status_change(
    record: &mut Record,
    previous: Option<&Record>,
    actor: &str,
    at: NaiveDateTime,
) -> bool {
    let new_status = record.get(columns::STATUS).cloned().unwrap_or_default();
    let old_status = previous
        .and_then(|previous| previous.get(columns::STATUS))
        .cloned()
        .unwrap_or_default();
    if new_status.is_blank() || new_status.same_as(&old_status) {
        return false;
    }

    record.set(columns::UPDATED_AT, FieldValue::DateTime(at));
    record.set(columns::UPDATED_BY, actor);
    true
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn complete() -> Record {
        Record::with_id("12AB3")
            .with(columns::STUDY, "EST-01")
            .with(columns::PARTICIPANT, "P-007")
            .with(columns::FINDING, "TCLE sem data")
            .with(columns::RAISED_BY, "Ana")
            .with(columns::DOCUMENT, "TCLE")
            .with(columns::STATUS, "PENDENTE")
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    #[test]
    fn complete_record_passes() {
        assert!(validate_new_record(&complete()).is_ok());
    }

    #[test]
    fn missing_required_fields_are_listed() {
        let record = complete()
            .with(columns::PARTICIPANT, "  ")
            .with(columns::FINDING, FieldValue::Empty);

        let message = validate_new_record(&record).unwrap_err().to_string();

        assert!(message.contains(columns::PARTICIPANT));
        assert!(message.contains(columns::FINDING));
        assert!(!message.contains(columns::STUDY));
    }

    #[test]
    fn malformed_id_is_rejected() {
        let record = complete().with(columns::ID, "1234A");
        assert!(matches!(
            validate_new_record(&record),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn status_companions_are_enforced() {
        let verifying = complete().with(columns::STATUS, "VERIFICANDO");
        assert!(validate_status_requirements(&verifying).is_err());
        assert!(validate_status_requirements(&verifying.with(columns::VERIFIER, "Carla")).is_ok());

        let not_applicable = complete().with(columns::STATUS, "NÃO APLICÁVEL");
        assert!(validate_status_requirements(&not_applicable).is_err());
        assert!(validate_status_requirements(
            &not_applicable.with(columns::JUSTIFICATION, "documento dispensado")
        )
        .is_ok());

        let done = complete().with(columns::STATUS, "REALIZADO");
        assert!(validate_status_requirements(&done).is_err());
        assert!(validate_status_requirements(
            &done.with(columns::RESOLVED_ON, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
        )
        .is_ok());
    }

    #[test]
    fn unknown_status_is_rejected_and_blank_passes() {
        let unknown = complete().with(columns::STATUS, "ARQUIVADO");
        assert!(validate_status_requirements(&unknown).is_err());

        let blank = complete().with(columns::STATUS, "");
        assert!(validate_status_requirements(&blank).is_ok());
    }

    #[test]
    fn duplicate_is_found_by_study_document_and_participant() {
        let mut snapshot = Snapshot::default();
        snapshot.records.push(
            complete()
                .with(columns::ID, "001AA")
                .with(columns::RAISED_ON, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
        );
        snapshot
            .records
            .push(complete().with(columns::ID, "002AA").with(columns::DOCUMENT, "CRF"));

        let found = find_duplicate(&snapshot, &complete()).unwrap();
        assert_eq!(found.id().as_deref(), Some("001AA"));

        let other_participant = complete().with(columns::PARTICIPANT, "P-008");
        assert!(find_duplicate(&snapshot, &other_participant).is_none());
    }

    #[test]
    fn record_is_not_its_own_duplicate() {
        let mut snapshot = Snapshot::default();
        snapshot.records.push(complete());
        assert!(find_duplicate(&snapshot, &complete()).is_none());
    }

    #[test]
    fn status_change_is_stamped() {
        let previous = complete();
        let mut edited = complete().with(columns::STATUS, "VERIFICANDO");

        assert!(stamp_status_change(&mut edited, Some(&previous), "Bruno", at()));
        assert_eq!(edited.get(columns::UPDATED_AT), Some(&FieldValue::DateTime(at())));
        assert_eq!(edited.text(columns::UPDATED_BY).as_deref(), Some("Bruno"));
    }

    #[test]
    fn unchanged_status_is_not_stamped() {
        let previous = complete();
        let mut edited = complete().with(columns::SHIFT, "noturno");

        assert!(!stamp_status_change(&mut edited, Some(&previous), "Bruno", at()));
        assert!(!edited.contains(columns::UPDATED_AT));
    }
}
