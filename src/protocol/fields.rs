use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use regex::Regex;

const DATE_FORMAT: &str = "%d.%m.%Y";
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not parse {field} value {value:?}")]
pub struct FieldParseError {
    pub field: &'static str,
    pub value: String,
}

/// Parses a `dd.mm.yyyy` protocol date. Empty input is `Ok(None)`.
pub fn parse_protocol_date(raw: &str) -> Result<Option<NaiveDate>, FieldParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(Some)
        .map_err(|_| FieldParseError {
            field: "date",
            value: trimmed.to_string(),
        })
}

/// Parses `H:MM`, falling back to `H:MM:SS`. Empty input is `Ok(None)`.
pub fn parse_protocol_time(raw: &str) -> Result<Option<NaiveTime>, FieldParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .map(Some)
        .ok_or_else(|| FieldParseError {
            field: "time",
            value: trimmed.to_string(),
        })
}

/// ISO-8601 durations of the form `PnDTnHnMn.nS`.
#[derive(Debug, Clone)]
pub struct DurationParser {
    pattern: Regex,
}

impl DurationParser {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(
            r"(?i)^(?P<sign>[-+]?)P(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)(?:[.,](?P<fraction>\d{1,9}))?S)?)?$",
        )
        .context("failed to compile ISO-8601 duration regex")?;

        Ok(Self { pattern })
    }

    /// Missing or malformed durations resolve to zero.
    pub fn parse_or_zero(&self, raw: &str) -> TimeDelta {
        self.parse(raw).unwrap_or_else(TimeDelta::zero)
    }

    pub fn parse(&self, raw: &str) -> Option<TimeDelta> {
        let trimmed = raw.trim();
        let captures = self.pattern.captures(trimmed)?;

        let component = |name: &str| -> Option<i64> {
            captures
                .name(name)
                .map(|value| value.as_str().parse::<i64>().ok())
                .unwrap_or(Some(0))
        };

        let has_component = ["days", "hours", "minutes", "seconds"]
            .iter()
            .any(|name| captures.name(name).is_some());
        if !has_component || trimmed.to_ascii_uppercase().ends_with('T') {
            return None;
        }

        let nanos = captures
            .name("fraction")
            .map(|value| {
                let digits = value.as_str();
                let padded = format!("{digits:0<9}");
                padded.parse::<i64>().ok()
            })
            .unwrap_or(Some(0))?;

        let total = TimeDelta::try_days(component("days")?)?
            .checked_add(&TimeDelta::try_hours(component("hours")?)?)?
            .checked_add(&TimeDelta::try_minutes(component("minutes")?)?)?
            .checked_add(&TimeDelta::try_seconds(component("seconds")?)?)?
            .checked_add(&TimeDelta::nanoseconds(nanos))?;

        if captures.name("sign").map(|value| value.as_str()) == Some("-") {
            Some(-total)
        } else {
            Some(total)
        }
    }
}
