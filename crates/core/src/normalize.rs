//! Arrival-time normalisation: upstream timestamp text to whole minutes.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::FetchError;

/// Timestamp layouts used by the transit APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Bus tracker `prdtm`, minute precision.
    Bus,
    /// Train tracker `arrT`, second precision.
    Train,
}

impl TimestampFormat {
    /// `strftime` pattern for this layout.
    pub fn pattern(self) -> &'static str {
        match self {
            TimestampFormat::Bus => "%Y%m%d %H:%M",
            TimestampFormat::Train => "%Y%m%d %H:%M:%S",
        }
    }
}

/// Parse `raw` and pin it to `zone`, independent of the host time zone.
///
/// Ambiguous wall-clock times (DST fall-back) resolve to the earlier instant;
/// times inside a spring-forward gap do not exist and are rejected.
pub fn parse_arrival(
    raw: &str,
    format: TimestampFormat,
    zone: Tz,
) -> Result<DateTime<Tz>, FetchError> {
    let malformed = || FetchError::MalformedTimestamp {
        value: raw.to_string(),
        format: format.pattern(),
    };
    let naive = NaiveDateTime::parse_from_str(raw.trim(), format.pattern())
        .map_err(|_| malformed())?;
    zone.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(malformed)
}

/// Whole minutes from `now` until the arrival described by `raw`.
///
/// Truncates toward zero; arrivals at or before `now` report `0`.
pub fn minutes_until(
    raw: &str,
    format: TimestampFormat,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<u32, FetchError> {
    let arrival = parse_arrival(raw, format, zone)?;
    let now = now.with_timezone(&zone);
    if arrival <= now {
        return Ok(0);
    }
    let seconds = (arrival - now).num_seconds();
    Ok(u32::try_from(seconds / 60).unwrap_or(u32::MAX))
}
