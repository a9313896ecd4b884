//! Finding record model

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::columns;
use super::status::{ParseStatusError, Status};
use super::value::FieldValue;
use crate::Error;

/// Short record identifier: three digits and two uppercase letters in any order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub const LEN: usize = 5;

    /// Validate and wrap an identifier.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let raw = raw.trim();
        let digits = raw.chars().filter(char::is_ascii_digit).count();
        let letters = raw.chars().filter(char::is_ascii_uppercase).count();

        if raw.len() == Self::LEN && digits == 3 && letters == 2 {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::InvalidInput(format!(
                "Record ID '{raw}' must have 3 digits and 2 uppercase letters"
            )))
        }
    }

    pub(crate) const fn from_generated(value: String) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<RecordId> for FieldValue {
    fn from(value: RecordId) -> Self {
        Self::Text(value.0)
    }
}

/// One finding: an ordered mapping of column name to cell value.
///
/// Field order is kept so that columns first introduced by a record land
/// in the workbook in the order the form produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Start a record with its identity column set.
    #[must_use]
    pub fn with_id(id: impl fmt::Display) -> Self {
        Self::new().with(columns::ID, FieldValue::Text(id.to_string()))
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, returning the previous value when present.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let name = name.into();
        let value = value.into();
        if let Some((_, slot)) = self.fields.iter_mut().find(|(key, _)| *key == name) {
            return Some(std::mem::replace(slot, value));
        }
        self.fields.push((name, value));
        None
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The record identifier, or `None` when the `ID` cell is missing or blank.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.get(columns::ID).and_then(FieldValue::non_blank_text)
    }

    /// Non-blank display text of a field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(FieldValue::non_blank_text)
    }

    /// Parsed status; `None` when the status cell is blank.
    pub fn status(&self) -> Option<Result<Status, ParseStatusError>> {
        self.text(columns::STATUS).map(|text| text.parse())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_parse_accepts_any_order() {
        for raw in ["123AB", "A1B23", "AB123", "1A2B3"] {
            assert_eq!(RecordId::parse(raw).unwrap().as_str(), raw);
        }
    }

    #[test]
    fn record_id_parse_rejects_bad_shapes() {
        for raw in ["1234A", "12ABC", "12ab3", "123AB4", "", "12 AB"] {
            assert!(RecordId::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn set_replaces_in_place_and_keeps_order() {
        let mut record = Record::with_id("001AB").with("Status", "PENDENTE").with("Plantão", "X");
        let previous = record.set("Status", "REALIZADO");

        assert_eq!(previous, Some(FieldValue::from("PENDENTE")));
        let names: Vec<&str> = record.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["ID", "Status", "Plantão"]);
        assert_eq!(record.get("Status"), Some(&FieldValue::from("REALIZADO")));
    }

    #[test]
    fn id_ignores_blank_cells() {
        assert_eq!(Record::new().with("ID", "  ").id(), None);
        assert_eq!(Record::with_id("001AB").id().as_deref(), Some("001AB"));
    }

    #[test]
    fn status_parses_cell_text() {
        let record = Record::with_id("001AB").with("Status", "VERIFICANDO");
        assert_eq!(record.status(), Some(Ok(Status::Verifying)));
        assert_eq!(Record::with_id("001AB").status(), None);
    }

    #[test]
    fn serializes_as_ordered_map() {
        let record = Record::with_id("001AB").with("Status", "PENDENTE");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"ID":"001AB","Status":"PENDENTE"}"#);
    }
}
