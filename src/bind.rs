//! Parameter binding with type-specific marshaling.
//!
//! One operation per logical value kind, each resolving the prepared
//! statement by handle and setting a 1-based parameter position. Time-of-day
//! text is parsed here; instants arrive as signed microseconds from the epoch
//! and are bound zone-qualified first, with a zone-naive fallback for drivers
//! lacking zone-aware parameter APIs.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};

use crate::driver::ParamValue;
use crate::error::{BridgeError, Result};
use crate::registry::{CursorRegistry, Handle};

pub(crate) fn bind_value(
    registry: &CursorRegistry,
    handle: Handle,
    position: usize,
    value: ParamValue,
) -> Result<()> {
    registry.with_prepared(handle, |statement| statement.bind(position, value))
}

/// Parse a canonical time-of-day text form: `HH:MM:SS`, an optional
/// fractional-second part of 1 to 6 digits, and an optional `Z` or `±hh[:mm]`
/// suffix.
pub(crate) fn parse_time_of_day(text: &str) -> Result<(NaiveTime, Option<FixedOffset>)> {
    let (clock, zone) = split_zone(text);
    let time = NaiveTime::parse_from_str(clock, "%H:%M:%S%.f")
        .map_err(|e| BridgeError::MalformedValue(format!("bad time value \"{text}\": {e}")))?;
    let offset = zone.map(|z| parse_offset(text, z)).transpose()?;
    Ok((time, offset))
}

fn split_zone(text: &str) -> (&str, Option<&str>) {
    if let Some(clock) = text.strip_suffix(['Z', 'z']) {
        return (clock, Some("Z"));
    }
    // The clock part is at least HH:MM:SS long; any sign after it starts an
    // offset suffix.
    if text.len() > 8 {
        if let Some(idx) = text[8..].find(['+', '-']) {
            let idx = idx + 8;
            return (&text[..idx], Some(&text[idx..]));
        }
    }
    (text, None)
}

fn parse_offset(full: &str, zone: &str) -> Result<FixedOffset> {
    let malformed = || BridgeError::MalformedValue(format!("bad zone offset in \"{full}\""));

    if zone == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(malformed);
    }
    let negative = zone.starts_with('-');
    let digits = &zone[1..];
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 2 => (digits, "0"),
        None if digits.len() == 4 => (&digits[..2], &digits[2..]),
        _ => return Err(malformed()),
    };
    let hours: i32 = hours.parse().map_err(|_| malformed())?;
    let minutes: i32 = minutes.parse().map_err(|_| malformed())?;
    if hours > 23 || minutes > 59 {
        return Err(malformed());
    }
    let mut seconds = hours * 3600 + minutes * 60;
    if negative {
        seconds = -seconds;
    }
    FixedOffset::east_opt(seconds).ok_or_else(malformed)
}

/// Bind a local time of day parsed from text. Any zone suffix is accepted and
/// discarded; the value kind is zone-free.
pub(crate) fn bind_time(
    registry: &CursorRegistry,
    handle: Handle,
    position: usize,
    text: &str,
) -> Result<()> {
    let (time, _) = parse_time_of_day(text)?;
    bind_value(registry, handle, position, ParamValue::Time(time))
}

/// Bind a time of day with offset; a missing suffix defaults to UTC.
pub(crate) fn bind_timetz(
    registry: &CursorRegistry,
    handle: Handle,
    position: usize,
    text: &str,
) -> Result<()> {
    let (time, offset) = parse_time_of_day(text)?;
    let offset = offset.unwrap_or_else(|| Utc.fix());
    bind_value(registry, handle, position, ParamValue::TimeTz(time, offset))
}

/// Bind a microsecond-precision instant given as a signed offset from the
/// Unix epoch. The zone-qualified bind is attempted first; drivers that
/// report it unsupported get the zone-naive form, on which implicit
/// driver/server zone conventions apply.
pub(crate) fn bind_timestamp(
    registry: &CursorRegistry,
    handle: Handle,
    position: usize,
    epoch_micros: i64,
) -> Result<()> {
    let instant = DateTime::<Utc>::from_timestamp_micros(epoch_micros).ok_or_else(|| {
        BridgeError::MalformedValue(format!(
            "timestamp {epoch_micros}us is outside the representable range"
        ))
    })?;
    registry.with_prepared(handle, |statement| {
        match statement.bind(position, ParamValue::Timestamp(instant)) {
            Err(BridgeError::Unsupported(_)) => {
                statement.bind(position, ParamValue::TimestampNaive(instant.naive_utc()))
            }
            other => other,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_time() {
        let (time, offset) = parse_time_of_day("12:34:56").unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(12, 34, 56).unwrap());
        assert!(offset.is_none());
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let (time, _) = parse_time_of_day("12:34:56.123456").unwrap();
        assert_eq!(
            time,
            NaiveTime::from_hms_micro_opt(12, 34, 56, 123_456).unwrap()
        );

        let (time, _) = parse_time_of_day("01:02:03.5").unwrap();
        assert_eq!(
            time,
            NaiveTime::from_hms_micro_opt(1, 2, 3, 500_000).unwrap()
        );
    }

    #[test]
    fn test_parse_zone_suffixes() {
        let (_, offset) = parse_time_of_day("12:34:56Z").unwrap();
        assert_eq!(offset.unwrap().local_minus_utc(), 0);

        let (_, offset) = parse_time_of_day("12:34:56+07:00").unwrap();
        assert_eq!(offset.unwrap().local_minus_utc(), 7 * 3600);

        let (_, offset) = parse_time_of_day("12:34:56.25-0530").unwrap();
        assert_eq!(offset.unwrap().local_minus_utc(), -(5 * 3600 + 30 * 60));

        let (_, offset) = parse_time_of_day("12:34:56+02").unwrap();
        assert_eq!(offset.unwrap().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_malformed_time_is_rejected() {
        assert!(matches!(
            parse_time_of_day("not a time"),
            Err(BridgeError::MalformedValue(_))
        ));
        assert!(matches!(
            parse_time_of_day("12:34:56+99:00"),
            Err(BridgeError::MalformedValue(_))
        ));
        assert!(matches!(
            parse_time_of_day("25:00:00"),
            Err(BridgeError::MalformedValue(_))
        ));
    }
}
