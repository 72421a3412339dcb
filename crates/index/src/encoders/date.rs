//! Date encoding.
//!
//! Every instant is written twice: a fixed-width UTC string that sorts
//! lexicographically (`2020-01-01T05:00:00.000Z`) and the same instant in the
//! offset the document declared (`2020-01-01T00:00:00.000-05:00`). Values
//! without an offset use the configured default.
//!
//! Partial dates keep their precision: as a period end, `2020-03` means the
//! last millisecond of March 2020.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime,
    SecondsFormat, TimeZone, Utc,
};
use serde_json::{Map, Value};

use crate::error::ValueError;
use crate::path::{ChoiceType, Node};
use crate::types::EntryValue;

use super::token::json_type;

/// Precision of a parsed date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatePrecision {
    /// `2024`
    Year,
    /// `2024-01`
    Month,
    /// `2024-01-15`
    Day,
    /// `2024-01-15T10:30`
    Minute,
    /// `2024-01-15T10:30:00`
    Second,
    /// `2024-01-15T10:30:00.123`
    Fraction,
}

/// A date value parsed with its precision and effective offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FhirDate {
    /// Earliest instant covered by the value.
    pub start: DateTime<FixedOffset>,
    /// Precision the value was written with.
    pub precision: DatePrecision,
}

impl FhirDate {
    /// Parses a FHIR date, dateTime or instant.
    pub fn parse(raw: &str, default_offset: FixedOffset) -> Result<Self, ValueError> {
        let s = raw.trim();
        let (date_part, time_part) = match s.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (s, None),
        };

        let (date, date_precision) = parse_date(date_part)
            .ok_or_else(|| ValueError::new(format!("invalid date '{}'", raw)))?;

        let Some(time_part) = time_part else {
            let start = at_offset(date.and_time(NaiveTime::MIN), default_offset, raw)?;
            return Ok(Self {
                start,
                precision: date_precision,
            });
        };

        if date_precision != DatePrecision::Day {
            return Err(ValueError::new(format!(
                "time given without a full date in '{}'",
                raw
            )));
        }

        let (clock, offset) = split_offset(time_part)
            .ok_or_else(|| ValueError::new(format!("invalid offset in '{}'", raw)))?;
        let (time, precision) = parse_time(clock)
            .ok_or_else(|| ValueError::new(format!("invalid time in '{}'", raw)))?;

        let start = at_offset(date.and_time(time), offset.unwrap_or(default_offset), raw)?;
        Ok(Self { start, precision })
    }

    /// Returns the last instant covered by the value.
    ///
    /// Date-only values extend to the end of their year, month or day.
    /// Values with a time component are exact.
    pub fn end(&self) -> DateTime<FixedOffset> {
        let next = match self.precision {
            DatePrecision::Year => first_of_month(self.start.year() + 1, 1),
            DatePrecision::Month => {
                let (y, m) = (self.start.year(), self.start.month());
                if m == 12 {
                    first_of_month(y + 1, 1)
                } else {
                    first_of_month(y, m + 1)
                }
            }
            DatePrecision::Day => self.start.date_naive().succ_opt(),
            _ => return self.start,
        };

        next.and_then(|d| {
            self.start
                .offset()
                .from_local_datetime(&d.and_time(NaiveTime::MIN))
                .single()
        })
        .map(|d| d - Duration::milliseconds(1))
        .unwrap_or(self.start)
    }
}

/// UTC, fixed-width, lexicographically sortable.
pub fn format_utc(instant: &DateTime<FixedOffset>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The instant in its own offset.
pub fn format_local(instant: &DateTime<FixedOffset>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Encodes a date-like node.
pub fn encode(node: &Node<'_>, default_offset: FixedOffset) -> Result<Vec<EntryValue>, ValueError> {
    match node.value {
        Value::String(s) => {
            if s.trim().is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![instant(s, default_offset)?])
        }
        Value::Object(obj) => match node.choice_type() {
            Some(ChoiceType::Timing) => timing(obj, default_offset),
            Some(ChoiceType::Period) => Ok(period(obj, default_offset)?.into_iter().collect()),
            _ if obj.contains_key("event") || obj.contains_key("repeat") => {
                timing(obj, default_offset)
            }
            _ if obj.contains_key("start") || obj.contains_key("end") => {
                Ok(period(obj, default_offset)?.into_iter().collect())
            }
            _ => Err(ValueError::new("object is not a Period or Timing")),
        },
        other => Err(ValueError::new(format!(
            "cannot encode {} as date",
            json_type(other)
        ))),
    }
}

/// Encodes a single timestamp as an instant.
pub fn instant(raw: &str, default_offset: FixedOffset) -> Result<EntryValue, ValueError> {
    let parsed = FhirDate::parse(raw, default_offset)?;
    Ok(EntryValue::Instant {
        utc: format_utc(&parsed.start),
        local: format_local(&parsed.start),
    })
}

/// Encodes a period. A period with neither bound yields nothing.
pub fn period(
    obj: &Map<String, Value>,
    default_offset: FixedOffset,
) -> Result<Option<EntryValue>, ValueError> {
    let bound = |key: &str| -> Result<Option<FhirDate>, ValueError> {
        obj.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(|s| FhirDate::parse(s, default_offset))
            .transpose()
    };

    let start = bound("start")?.map(|d| d.start);
    let end = bound("end")?.map(|d| d.end());

    if let (Some(s), Some(e)) = (start, end)
        && e < s
    {
        return Err(ValueError::new("period end is before its start"));
    }

    if start.is_none() && end.is_none() {
        return Ok(None);
    }

    Ok(Some(EntryValue::Period {
        start: start.as_ref().map(format_utc),
        end: end.as_ref().map(format_utc),
        start_local: start.as_ref().map(format_local),
        end_local: end.as_ref().map(format_local),
    }))
}

fn timing(obj: &Map<String, Value>, default_offset: FixedOffset) -> Result<Vec<EntryValue>, ValueError> {
    let mut values = Vec::new();

    if let Some(events) = obj.get("event").and_then(Value::as_array) {
        for event in events.iter().filter_map(Value::as_str) {
            if !event.trim().is_empty() {
                values.push(instant(event, default_offset)?);
            }
        }
    }

    if let Some(bounds) = obj
        .get("repeat")
        .and_then(|r| r.get("boundsPeriod"))
        .and_then(Value::as_object)
    {
        values.extend(period(bounds, default_offset)?);
    }

    Ok(values)
}

fn parse_date(s: &str) -> Option<(NaiveDate, DatePrecision)> {
    match s.len() {
        4 => {
            let year = s.parse().ok()?;
            Some((NaiveDate::from_ymd_opt(year, 1, 1)?, DatePrecision::Year))
        }
        7 => {
            let (y, m) = s.split_once('-')?;
            Some((
                NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, 1)?,
                DatePrecision::Month,
            ))
        }
        10 => Some((
            NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?,
            DatePrecision::Day,
        )),
        _ => None,
    }
}

fn parse_time(s: &str) -> Option<(NaiveTime, DatePrecision)> {
    if s.contains('.') {
        NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
            .ok()
            .map(|t| (t, DatePrecision::Fraction))
    } else if s.len() == 8 {
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .ok()
            .map(|t| (t, DatePrecision::Second))
    } else {
        NaiveTime::parse_from_str(s, "%H:%M")
            .ok()
            .map(|t| (t, DatePrecision::Minute))
    }
}

// Splits `10:30:00+05:00` into the clock and an optional offset
fn split_offset(time: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(clock) = time.strip_suffix('Z').or_else(|| time.strip_suffix('z')) {
        return Some((clock, FixedOffset::east_opt(0)));
    }

    let Some(pos) = time.rfind(['+', '-']) else {
        return Some((time, None));
    };

    let (clock, zone) = time.split_at(pos);
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let digits = &zone[1..];
    let (hours, minutes) = match digits.split_once(':') {
        Some(parts) => parts,
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let seconds = hours.parse::<i32>().ok()? * 3600 + minutes.parse::<i32>().ok()? * 60;
    Some((clock, Some(FixedOffset::east_opt(sign * seconds)?)))
}

fn at_offset(
    local: NaiveDateTime,
    offset: FixedOffset,
    raw: &str,
) -> Result<DateTime<FixedOffset>, ValueError> {
    offset
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| ValueError::new(format!("ambiguous local time '{}'", raw)))
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}
