//! Row marshaling.
//!
//! Converts one driver row into the generic per-column value array handed to
//! the calling engine: raw bytes for binary-family columns, ISO-8601 UTC
//! instant text for timestamp-family columns, plain text for everything else.

use chrono::{DateTime, Utc};
use smallvec::SmallVec;

use crate::driver::RemoteValue;

/// One marshaled column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bytes(Vec<u8>),
    Text(String),
}

impl Cell {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

/// One marshaled row. Inline storage avoids heap allocation for rows of up to
/// 16 columns.
pub type Row = SmallVec<[Cell; 16]>;

/// Timestamps are rendered in ISO-8601 instant style, fraction omitted when
/// zero, always in UTC regardless of the source zone.
pub(crate) fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string()
}

pub(crate) fn marshal_row(values: Vec<RemoteValue>) -> Row {
    values
        .into_iter()
        .map(|value| match value {
            RemoteValue::Null => Cell::Null,
            RemoteValue::Bytes(data) => Cell::Bytes(data),
            RemoteValue::Timestamp(instant) => Cell::Text(format_instant(instant)),
            RemoteValue::Text(text) => Cell::Text(text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_instant_iso_style() {
        let whole = Utc.with_ymd_and_hms(2023, 6, 1, 12, 34, 56).unwrap();
        assert_eq!(format_instant(whole), "2023-06-01T12:34:56Z");

        let fractional = DateTime::<Utc>::from_timestamp_micros(1_685_622_896_123_456).unwrap();
        assert_eq!(format_instant(fractional), "2023-06-01T12:34:56.123456Z");
    }

    #[test]
    fn test_marshal_row_conversions() {
        let instant = Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap();
        let row = marshal_row(vec![
            RemoteValue::Null,
            RemoteValue::Bytes(vec![0xde, 0xad]),
            RemoteValue::Timestamp(instant),
            RemoteValue::Text("42".to_string()),
        ]);

        assert_eq!(row.len(), 4);
        assert!(row[0].is_null());
        assert_eq!(row[1], Cell::Bytes(vec![0xde, 0xad]));
        assert_eq!(row[2], Cell::Text("2021-01-02T03:04:05Z".to_string()));
        assert_eq!(row[3], Cell::Text("42".to_string()));
    }
}
