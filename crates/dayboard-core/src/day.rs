use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::{start_of_day, tick};
use crate::event::Interval;

/// Inclusive bounds of one calendar day in the display timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub day: NaiveDate,
    pub first: DateTime<Tz>,
    pub last: DateTime<Tz>,
}

impl DayBounds {
    pub fn new(day: NaiveDate, tz: &Tz) -> Self {
        let first = start_of_day(tz, day);
        let next = day
            .succ_opt()
            .map(|next| start_of_day(tz, next))
            .unwrap_or_else(|| first + chrono::Duration::days(1));
        Self {
            day,
            first,
            last: next - tick(),
        }
    }
}

/// Whether `interval` touches `bounds`.
///
/// Timed intervals use an inclusive test on both ends, so an event ending at
/// exactly midnight still counts for the day it ends on. All-day intervals
/// treat `end` as exclusive.
pub fn overlaps(interval: &Interval, bounds: &DayBounds) -> bool {
    let end = if interval.all_day {
        interval.end - tick()
    } else {
        interval.end
    };
    interval.start <= bounds.last && end >= bounds.first
}

/// Intervals that overlap one calendar day, in arrival order.
#[derive(Debug, Clone)]
pub struct DayBucket {
    pub bounds: DayBounds,
    pub timed: Vec<Interval>,
    pub all_day: Vec<Interval>,
}

impl DayBucket {
    pub fn collect(day: NaiveDate, tz: &Tz, intervals: &[Interval]) -> Self {
        let bounds = DayBounds::new(day, tz);
        let (all_day, timed): (Vec<Interval>, Vec<Interval>) = intervals
            .iter()
            .filter(|interval| overlaps(interval, &bounds))
            .cloned()
            .partition(|interval| interval.all_day);

        debug!(
            day = %day,
            timed = timed.len(),
            all_day = all_day.len(),
            "built day bucket"
        );

        Self {
            bounds,
            timed,
            all_day,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.bounds.day
    }

    pub fn is_empty(&self) -> bool {
        self.timed.is_empty() && self.all_day.is_empty()
    }
}

/// The two buckets a render pass draws.
#[derive(Debug, Clone)]
pub struct Agenda {
    pub today: DayBucket,
    pub tomorrow: DayBucket,
}

impl Agenda {
    /// Splits intervals into today/tomorrow. An interval crossing midnight
    /// lands in both.
    pub fn split(intervals: &[Interval], today: NaiveDate, tz: &Tz) -> Self {
        let tomorrow = today.succ_opt().unwrap_or(today);
        Self {
            today: DayBucket::collect(today, tz, intervals),
            tomorrow: DayBucket::collect(tomorrow, tz, intervals),
        }
    }

    pub fn buckets(&self) -> [&DayBucket; 2] {
        [&self.today, &self.tomorrow]
    }
}
