//! Temporal values: instants, durations, and closed intervals.
//!
//! All three types serialize as their ISO 8601 literal so that an entity
//! written back to a client keeps the representation it was given.

use crate::error::ParseError;
use chrono::{DateTime, FixedOffset, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Neg;
use std::str::FromStr;

/// Coarse classification of a value, used for operator dispatch and in
/// diagnostics naming the operands of an unsupported combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Boolean,
    /// Numbers, strings and free-form JSON.
    Scalar,
    Instant,
    Duration,
    Interval,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Scalar => "scalar",
            ValueKind::Instant => "instant",
            ValueKind::Duration => "duration",
            ValueKind::Interval => "interval",
        };
        f.write_str(name)
    }
}

/// A point in time.
///
/// The timestamp is always held in UTC. The offset of the original literal is
/// kept only so that [`Instant::format`] can reproduce it; it never takes part
/// in comparisons.
///
/// # Examples
///
/// ```
/// use sensorthings_types::time::Instant;
///
/// let utc = Instant::parse("2020-01-01T00:00:00Z").unwrap();
/// let cet = Instant::parse("2020-01-01T01:00:00+01:00").unwrap();
/// assert_eq!(utc, cet);
/// assert!(utc.is_utc());
/// assert!(!cet.is_utc());
/// assert_eq!(cet.format(), "2020-01-01T01:00:00+01:00");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Instant {
    at: DateTime<Utc>,
    offset: Option<FixedOffset>,
}

impl Instant {
    /// Create a UTC instant.
    pub fn utc(at: DateTime<Utc>) -> Self {
        Self { at, offset: None }
    }

    /// Create an instant that remembers a non-UTC literal offset.
    pub fn with_offset(at: DateTime<FixedOffset>) -> Self {
        Self {
            at: at.with_timezone(&Utc),
            offset: Some(*at.offset()),
        }
    }

    /// Parse an RFC 3339 literal. A trailing `Z` marks the instant as UTC.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let parsed = DateTime::parse_from_rfc3339(text)
            .map_err(|e| ParseError::InvalidInstant(format!("{text}: {e}")))?;
        if text.ends_with('Z') || text.ends_with('z') {
            Ok(Self::utc(parsed.with_timezone(&Utc)))
        } else {
            Ok(Self::with_offset(parsed))
        }
    }

    /// Normalized UTC timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }

    /// Whether the original literal was given in UTC.
    pub fn is_utc(&self) -> bool {
        self.offset.is_none()
    }

    /// Render the literal in its original zone.
    pub fn format(&self) -> String {
        match self.offset {
            None => self.at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Some(offset) => self
                .at
                .with_timezone(&offset)
                .to_rfc3339_opts(SecondsFormat::AutoSi, false),
        }
    }

    /// Render the normalized UTC value without a zone designator, for
    /// stores whose timestamp columns carry no time zone.
    pub fn format_naive_utc(&self) -> String {
        self.at.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }

    /// Shift by a signed duration, keeping the zone of the literal.
    pub fn checked_add(&self, duration: TimeDuration) -> Option<Self> {
        self.at.checked_add_signed(duration.0).map(|at| Self {
            at,
            offset: self.offset,
        })
    }

    pub fn checked_sub(&self, duration: TimeDuration) -> Option<Self> {
        self.checked_add(-duration)
    }

    /// Wall-clock difference `self - other`.
    pub fn since(&self, other: &Instant) -> TimeDuration {
        TimeDuration(self.at.signed_duration_since(other.at))
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at)
    }
}

impl Hash for Instant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.at.hash(state);
    }
}

impl From<DateTime<Utc>> for Instant {
    fn from(at: DateTime<Utc>) -> Self {
        Self::utc(at)
    }
}

impl FromStr for Instant {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// A signed span of time with no calendar anchoring.
///
/// Literals use the ISO 8601 `PnDTnHnMnS` form (weeks are accepted on
/// input). Years and months are rejected because their length depends on
/// the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeDuration(pub TimeDelta);

impl TimeDuration {
    pub fn zero() -> Self {
        Self(TimeDelta::zero())
    }

    pub fn seconds(secs: i64) -> Self {
        Self(TimeDelta::seconds(secs))
    }

    pub fn hours(hours: i64) -> Self {
        Self(TimeDelta::hours(hours))
    }

    pub fn days(days: i64) -> Self {
        Self(TimeDelta::days(days))
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < TimeDelta::zero()
    }

    /// `None` when the sum leaves the representable range.
    pub fn checked_add(&self, other: TimeDuration) -> Option<Self> {
        self.0.checked_add(&other.0).map(Self)
    }

    pub fn checked_sub(&self, other: TimeDuration) -> Option<Self> {
        self.0.checked_sub(&other.0).map(Self)
    }

    /// Scale by a real factor, rounding to whole milliseconds.
    pub fn mul_f64(&self, factor: f64) -> Option<Self> {
        let millis = self.0.num_milliseconds() as f64 * factor;
        if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
            return None;
        }
        TimeDelta::try_milliseconds(millis.round() as i64).map(Self)
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidDuration(text.to_string());

        let (negative, rest) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let rest = rest
            .strip_prefix('P')
            .or_else(|| rest.strip_prefix('p'))
            .ok_or_else(invalid)?;
        let (date_part, time_part) = match rest.split_once(['T', 't']) {
            Some((date, time)) => (date, Some(time)),
            None => (rest, None),
        };

        let mut millis: f64 = 0.0;
        let mut components = 0;
        for (value, designator) in designators(date_part).ok_or_else(invalid)? {
            let unit = match designator {
                'W' => 604_800.0,
                'D' => 86_400.0,
                _ => return Err(invalid()),
            };
            millis += value * unit * 1000.0;
            components += 1;
        }
        if let Some(time_part) = time_part {
            let parts = designators(time_part).ok_or_else(invalid)?;
            if parts.is_empty() {
                return Err(invalid());
            }
            for (value, designator) in parts {
                let unit = match designator {
                    'H' => 3_600.0,
                    'M' => 60.0,
                    'S' => 1.0,
                    _ => return Err(invalid()),
                };
                millis += value * unit * 1000.0;
                components += 1;
            }
        }
        if components == 0 || !millis.is_finite() || millis.abs() > i64::MAX as f64 {
            return Err(invalid());
        }

        let millis = millis.round() as i64;
        let delta = TimeDelta::try_milliseconds(millis).ok_or_else(invalid)?;
        Ok(Self(if negative { -delta } else { delta }))
    }

    /// ISO 8601 rendering, e.g. `P1DT2H`, `-PT30M`, `PT0.5S`.
    pub fn format(&self) -> String {
        let total = self.0.num_milliseconds();
        if total == 0 {
            return "PT0S".to_string();
        }
        let sign = if total < 0 { "-" } else { "" };
        let total = total.unsigned_abs();
        let days = total / 86_400_000;
        let hours = (total / 3_600_000) % 24;
        let minutes = (total / 60_000) % 60;
        let seconds = (total / 1000) % 60;
        let millis = total % 1000;

        let mut out = format!("{sign}P");
        if days > 0 {
            out.push_str(&format!("{days}D"));
        }
        if hours > 0 || minutes > 0 || seconds > 0 || millis > 0 {
            out.push('T');
            if hours > 0 {
                out.push_str(&format!("{hours}H"));
            }
            if minutes > 0 {
                out.push_str(&format!("{minutes}M"));
            }
            if millis > 0 {
                let frac = format!("{millis:03}");
                out.push_str(&format!("{seconds}.{}S", frac.trim_end_matches('0')));
            } else if seconds > 0 {
                out.push_str(&format!("{seconds}S"));
            }
        }
        out
    }
}

/// Split `1D2H` style text into `(value, designator)` pairs.
fn designators(text: &str) -> Option<Vec<(f64, char)>> {
    let mut parts = Vec::new();
    let mut number = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
        } else {
            if number.is_empty() {
                return None;
            }
            let value: f64 = number.parse().ok()?;
            parts.push((value, c.to_ascii_uppercase()));
            number.clear();
        }
    }
    if number.is_empty() { Some(parts) } else { None }
}

impl Neg for TimeDuration {
    type Output = TimeDuration;

    fn neg(self) -> Self::Output {
        TimeDuration(-self.0)
    }
}

impl From<TimeDelta> for TimeDuration {
    fn from(delta: TimeDelta) -> Self {
        Self(delta)
    }
}

impl FromStr for TimeDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// A closed span `[start, end]` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: Instant,
    end: Instant,
}

impl Interval {
    pub fn new(start: Instant, end: Instant) -> Result<Self, ParseError> {
        if start > end {
            return Err(ParseError::InvertedInterval {
                start: start.format(),
                end: end.format(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse `start/end`, both RFC 3339.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let (start, end) = text
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidInterval(text.to_string()))?;
        Self::new(Instant::parse(start)?, Instant::parse(end)?)
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn length(&self) -> TimeDuration {
        self.end.since(&self.start)
    }

    /// Shift both bounds by the same amount.
    pub fn shifted(&self, by: TimeDuration) -> Option<Self> {
        Some(Self {
            start: self.start.checked_add(by)?,
            end: self.end.checked_add(by)?,
        })
    }

    pub fn format(&self) -> String {
        format!("{}/{}", self.start.format(), self.end.format())
    }
}

impl FromStr for Interval {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Any of the three temporal value shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalValue {
    Instant(Instant),
    Duration(TimeDuration),
    Interval(Interval),
}

impl TemporalValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TemporalValue::Instant(_) => ValueKind::Instant,
            TemporalValue::Duration(_) => ValueKind::Duration,
            TemporalValue::Interval(_) => ValueKind::Interval,
        }
    }

    /// Parse an interval if the text contains `/`, a duration if it starts
    /// with `P` (optionally signed), and an instant otherwise.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if text.contains('/') {
            Interval::parse(text).map(TemporalValue::Interval)
        } else if text.trim_start_matches('-').starts_with(['P', 'p']) {
            TimeDuration::parse(text).map(TemporalValue::Duration)
        } else {
            Instant::parse(text).map(TemporalValue::Instant)
        }
    }
}

impl fmt::Display for TemporalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalValue::Instant(i) => i.fmt(f),
            TemporalValue::Duration(d) => d.fmt(f),
            TemporalValue::Interval(i) => i.fmt(f),
        }
    }
}

macro_rules! literal_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.format())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                <$ty>::parse(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

literal_serde!(Instant);
literal_serde!(TimeDuration);
literal_serde!(Interval);
