//! Excel serial date conversion (1900 date system).

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::models::FieldValue;

const SECONDS_PER_DAY: f64 = 86_400.0;

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[allow(clippy::cast_precision_loss)]
pub fn date_to_serial(date: NaiveDate) -> f64 {
    (date - epoch().date()).num_days() as f64
}

#[allow(clippy::cast_precision_loss)]
pub fn datetime_to_serial(datetime: NaiveDateTime) -> f64 {
    let elapsed = datetime - epoch();
    elapsed.num_seconds() as f64 / SECONDS_PER_DAY
}

/// Turn a serial into a `Date` when it falls on midnight, else a `DateTime`.
#[allow(clippy::cast_possible_truncation)]
pub fn serial_to_value(serial: f64) -> FieldValue {
    if !serial.is_finite() {
        return FieldValue::Number(serial);
    }
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    let Some(datetime) =
        Duration::try_seconds(seconds).and_then(|offset| epoch().checked_add_signed(offset))
    else {
        return FieldValue::Number(serial);
    };

    if seconds % 86_400 == 0 {
        FieldValue::Date(datetime.date())
    } else {
        FieldValue::DateTime(datetime)
    }
}

/// Parse ISO 8601 date-time text some writers store instead of serials.
pub fn parse_iso(text: &str) -> FieldValue {
    let trimmed = text.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return FieldValue::DateTime(datetime);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return FieldValue::Date(date);
    }
    FieldValue::Text(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_serials_match_excel() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!((date_to_serial(date) - 45_292.0).abs() < f64::EPSILON);
        assert_eq!(serial_to_value(45_292.0), FieldValue::Date(date));
    }

    #[test]
    fn fractional_serial_becomes_datetime() {
        let datetime = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        assert!((datetime_to_serial(datetime) - 45_292.75).abs() < 1e-9);
        assert_eq!(serial_to_value(45_292.75), FieldValue::DateTime(datetime));
    }

    #[test]
    fn parse_iso_falls_back_to_text() {
        assert_eq!(
            parse_iso("2024-01-01"),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(parse_iso("amanhã"), FieldValue::from("amanhã"));
    }
}
