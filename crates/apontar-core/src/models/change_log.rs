//! Audit trail entries stored in the `log` sheet

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::value::FieldValue;

/// Header row of the `log` sheet.
pub const LOG_COLUMNS: [&str; 9] = [
    "timestamp",
    "record_id",
    "study",
    "operation",
    "field",
    "old_value",
    "new_value",
    "actor",
    "reason",
];

/// Kind of change an entry records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogOperation {
    Create,
    Update,
    /// Sentinel written when the record count dropped during a merge.
    Alert,
    /// Sentinel written when the stored workbook could not be read.
    Error,
    /// Operation text written by some other revision of the form.
    Other(String),
}

impl LogOperation {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Alert => "alert",
            Self::Error => "error",
            Self::Other(text) => text,
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "create" => Self::Create,
            "update" => Self::Update,
            "alert" => Self::Alert,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for LogOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogOperation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One row of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeLogEntry {
    /// Kept as a raw cell so timestamps written as text by older revisions survive.
    pub timestamp: FieldValue,
    pub record_id: String,
    pub study: String,
    pub operation: LogOperation,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub actor: String,
    pub reason: String,
    /// Columns this revision does not know about.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, FieldValue>,
}

impl ChangeLogEntry {
    #[must_use]
    pub fn new(
        timestamp: NaiveDateTime,
        record_id: impl Into<String>,
        operation: LogOperation,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: FieldValue::DateTime(timestamp),
            record_id: record_id.into(),
            study: String::new(),
            operation,
            field: String::new(),
            old_value: String::new(),
            new_value: String::new(),
            actor: actor.into(),
            reason: String::new(),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn study(mut self, study: impl Into<String>) -> Self {
        self.study = study.into();
        self
    }

    #[must_use]
    pub fn change(
        mut self,
        field: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        self.field = field.into();
        self.old_value = old_value.into();
        self.new_value = new_value.into();
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Cell values in `LOG_COLUMNS` order.
    #[must_use]
    pub fn standard_cells(&self) -> [FieldValue; 9] {
        [
            self.timestamp.clone(),
            FieldValue::Text(self.record_id.clone()),
            FieldValue::Text(self.study.clone()),
            FieldValue::Text(self.operation.as_str().to_string()),
            FieldValue::Text(self.field.clone()),
            FieldValue::Text(self.old_value.clone()),
            FieldValue::Text(self.new_value.clone()),
            FieldValue::Text(self.actor.clone()),
            FieldValue::Text(self.reason.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn operation_parse_keeps_unknown_text() {
        assert_eq!(LogOperation::parse("create"), LogOperation::Create);
        assert_eq!(LogOperation::parse(" alert "), LogOperation::Alert);
        assert_eq!(
            LogOperation::parse("bulk-edit"),
            LogOperation::Other("bulk-edit".to_string())
        );
        assert_eq!(LogOperation::Other("bulk-edit".to_string()).as_str(), "bulk-edit");
    }

    #[test]
    fn builder_fills_change_columns() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let entry = ChangeLogEntry::new(at, "001AB", LogOperation::Update, "Ana")
            .study("BE-2024-01")
            .change("Status", "PENDENTE", "REALIZADO")
            .reason("correção");

        let cells = entry.standard_cells();
        assert_eq!(cells[0], FieldValue::DateTime(at));
        assert_eq!(cells[3], FieldValue::from("update"));
        assert_eq!(cells[4], FieldValue::from("Status"));
        assert_eq!(cells[8], FieldValue::from("correção"));
    }
}
