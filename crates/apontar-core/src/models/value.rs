//! Typed cell values

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Display format for dates, matching what the entry form has always used.
pub const DATE_FORMAT: &str = "%d/%m/%Y";
/// Display format for timestamps.
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// The value held by one spreadsheet cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// Parse free-form user input into a value.
    ///
    /// Recognizes `dd/mm/yyyy`, `dd/mm/yyyy HH:MM:SS` and ISO dates; anything
    /// else is kept as trimmed text. Numbers stay text so codes such as
    /// `007` survive untouched.
    #[must_use]
    pub fn parse_input(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT) {
            return Self::DateTime(value);
        }
        if let Ok(value) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            return Self::Date(value);
        }
        if let Ok(value) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Self::Date(value);
        }
        Self::Text(trimmed.to_string())
    }

    /// Missing, whitespace-only text and NaN all count as blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Number(number) => number.is_nan(),
            Self::Bool(_) | Self::Date(_) | Self::DateTime(_) => false,
        }
    }

    /// Value equality used to decide whether a merge changed a cell.
    ///
    /// Blank values are equal to each other. Values of different kinds are
    /// compared through their display text, and a date equals the same day
    /// at midnight.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self.is_blank(), other.is_blank()) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            (false, false) => {}
        }

        match (self, other) {
            (Self::Text(left), Self::Text(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Date(left), Self::Date(right)) => left == right,
            (Self::DateTime(left), Self::DateTime(right)) => left == right,
            (Self::Date(date), Self::DateTime(datetime))
            | (Self::DateTime(datetime), Self::Date(date)) => {
                date.and_hms_opt(0, 0, 0).as_ref() == Some(datetime)
            }
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Borrow the text when this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Display text, or `None` when the value is blank.
    #[must_use]
    pub fn non_blank_text(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.to_string().trim().to_string())
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Number(number) if number.is_nan() => Ok(()),
            Self::Number(number) => write!(f, "{number}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Self::DateTime(datetime) => write!(f, "{}", datetime.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn blank_values_are_equal_to_each_other() {
        let blanks = [
            FieldValue::Empty,
            FieldValue::Text(String::new()),
            FieldValue::Text("   ".to_string()),
            FieldValue::Number(f64::NAN),
        ];
        for left in &blanks {
            for right in &blanks {
                assert!(left.same_as(right), "{left:?} vs {right:?}");
            }
        }
    }

    #[test]
    fn blank_differs_from_present_value() {
        assert!(!FieldValue::Empty.same_as(&FieldValue::from("X")));
        assert!(!FieldValue::from(0.0).same_as(&FieldValue::Number(f64::NAN)));
    }

    #[test]
    fn mixed_kinds_compare_by_display_text() {
        assert!(FieldValue::from(5.0).same_as(&FieldValue::from("5")));
        assert!(!FieldValue::from(5.5).same_as(&FieldValue::from("5")));
    }

    #[test]
    fn date_equals_midnight_datetime() {
        let day = date(2024, 3, 1);
        let midnight = day.and_hms_opt(0, 0, 0).unwrap();
        let noon = day.and_hms_opt(12, 0, 0).unwrap();
        assert!(FieldValue::from(day).same_as(&FieldValue::from(midnight)));
        assert!(!FieldValue::from(day).same_as(&FieldValue::from(noon)));
    }

    #[test]
    fn parse_input_recognizes_dates() {
        assert_eq!(
            FieldValue::parse_input("15/02/2024"),
            FieldValue::Date(date(2024, 2, 15))
        );
        assert_eq!(
            FieldValue::parse_input("2024-02-15"),
            FieldValue::Date(date(2024, 2, 15))
        );
        assert_eq!(
            FieldValue::parse_input("15/02/2024 08:30:00"),
            FieldValue::DateTime(date(2024, 2, 15).and_hms_opt(8, 30, 0).unwrap())
        );
        assert_eq!(FieldValue::parse_input(" 007 "), FieldValue::from("007"));
        assert_eq!(FieldValue::parse_input("  "), FieldValue::Empty);
    }

    #[test]
    fn display_uses_form_formats() {
        assert_eq!(FieldValue::from(date(2024, 2, 5)).to_string(), "05/02/2024");
        assert_eq!(FieldValue::from(3.0).to_string(), "3");
        assert_eq!(FieldValue::Number(f64::NAN).to_string(), "");
    }
}
