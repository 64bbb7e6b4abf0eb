use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use uuid::Uuid;

use crate::color::Color;

/// A timestamp as it came out of a feed, before it is pinned to the display
/// timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTime {
    /// A calendar date with no time component; marks an all-day event.
    Date(NaiveDate),
    /// Wall-clock time with no zone attached.
    Floating(NaiveDateTime),
    Utc(DateTime<Utc>),
    /// Wall-clock time in a named zone (iCalendar `TZID`).
    Zoned { local: NaiveDateTime, tzid: String },
    /// A value the decoder could not make sense of.
    Unparsable(String),
}

impl RawTime {
    pub fn is_date(&self) -> bool {
        matches!(self, RawTime::Date(_))
    }
}

#[derive(Debug, Clone)]
pub struct RawEvent {
    pub uid: Option<String>,
    pub title: Option<String>,
    pub start: Option<RawTime>,
    pub end: Option<RawTime>,
    pub duration: Option<Duration>,
    pub source: String,
    pub fill: Color,
}

impl RawEvent {
    pub fn new(source: impl Into<String>, fill: Color) -> Self {
        Self {
            uid: None,
            title: None,
            start: None,
            end: None,
            duration: None,
            source: source.into(),
            fill,
        }
    }
}

/// Identity of a normalized interval. Two structurally identical intervals
/// still carry different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A half-open `[start, end)` span in the display timezone.
///
/// `end > start` always holds for values produced by
/// [`crate::normalize::normalize`]. For all-day intervals `end` is the
/// exclusive day boundary.
#[derive(Debug, Clone)]
pub struct Interval {
    pub id: EventId,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub all_day: bool,
    pub label: String,
    pub source: String,
    pub fill: Color,
}

impl Interval {
    pub fn new(
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        all_day: bool,
        label: impl Into<String>,
        source: impl Into<String>,
        fill: Color,
    ) -> Self {
        Self {
            id: EventId::new(),
            start,
            end,
            all_day,
            label: label.into(),
            source: source.into(),
            fill,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
