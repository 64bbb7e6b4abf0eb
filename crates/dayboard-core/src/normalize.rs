use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, warn};

use crate::datetime::{localize, start_of_day};
use crate::event::{Interval, RawEvent, RawTime};

const DEFAULT_TITLE: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEventError {
    #[error("event has no start time")]
    MissingStart,
    #[error("event start is not a usable timestamp: {0:?}")]
    UnparsableStart(String),
}

/// Resolves a feed timestamp into the display timezone.
///
/// Dates become local midnight, floating times are read as display-local wall
/// clock, zoned times are converted. An unknown `TZID` falls back to the
/// display timezone.
pub fn resolve_time(raw: &RawTime, tz: &Tz) -> Option<DateTime<Tz>> {
    match raw {
        RawTime::Date(day) => Some(start_of_day(tz, *day)),
        RawTime::Floating(naive) => Some(localize(tz, *naive)),
        RawTime::Utc(instant) => Some(instant.with_timezone(tz)),
        RawTime::Zoned { local, tzid } => match tzid.trim().parse::<Tz>() {
            Ok(source_tz) => Some(localize(&source_tz, *local).with_timezone(tz)),
            Err(err) => {
                warn!(
                    tzid = %tzid,
                    error = %err,
                    "invalid TZID; reading time in display timezone"
                );
                Some(localize(tz, *local))
            }
        },
        RawTime::Unparsable(_) => None,
    }
}

/// Turns one raw event into a canonical interval.
///
/// End resolution order: explicit end, `start + duration`, one day for
/// all-day events, one hour otherwise. Any non-positive result is widened to
/// one minute.
pub fn normalize(raw: &RawEvent, tz: &Tz) -> Result<Interval, MalformedEventError> {
    let start_raw = raw.start.as_ref().ok_or(MalformedEventError::MissingStart)?;
    let start = resolve_time(start_raw, tz).ok_or_else(|| match start_raw {
        RawTime::Unparsable(value) => MalformedEventError::UnparsableStart(value.clone()),
        other => MalformedEventError::UnparsableStart(format!("{other:?}")),
    })?;
    let all_day = start_raw.is_date();

    let explicit_end = match raw.end.as_ref() {
        Some(end_raw) => {
            let resolved = resolve_time(end_raw, tz);
            if resolved.is_none() {
                warn!(
                    uid = ?raw.uid,
                    end = ?end_raw,
                    "event end is unusable; falling back to default duration"
                );
            }
            resolved
        }
        None => None,
    };

    let mut end = match (explicit_end, raw.duration) {
        (Some(end), _) => end,
        (None, Some(duration)) => start + duration,
        (None, None) if all_day => start
            .date_naive()
            .succ_opt()
            .map(|next| start_of_day(tz, next))
            .unwrap_or_else(|| start + Duration::days(1)),
        (None, None) => start + Duration::hours(1),
    };

    if end <= start {
        debug!(
            uid = ?raw.uid,
            start = %start,
            end = %end,
            "widening non-positive event to one minute"
        );
        end = start + Duration::minutes(1);
    }

    let label = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(DEFAULT_TITLE);

    Ok(Interval::new(
        start,
        end,
        all_day,
        label,
        raw.source.clone(),
        raw.fill,
    ))
}

/// Normalizes a batch, dropping (and logging) events without a usable start.
#[tracing::instrument(skip_all)]
pub fn ingest<I>(raws: I, tz: &Tz) -> Vec<Interval>
where
    I: IntoIterator<Item = RawEvent>,
{
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for raw in raws {
        match normalize(&raw, tz) {
            Ok(interval) => out.push(interval),
            Err(err) => {
                skipped += 1;
                warn!(
                    source = %raw.source,
                    uid = ?raw.uid,
                    title = ?raw.title,
                    error = %err,
                    "skipping malformed event"
                );
            }
        }
    }

    debug!(kept = out.len(), skipped, "normalized events");
    out
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Timelike, Utc};
    use chrono_tz::Tz;

    use super::{MalformedEventError, ingest, normalize};
    use crate::color::Color;
    use crate::event::{RawEvent, RawTime};

    fn berlin() -> Tz {
        "Europe/Berlin".parse().expect("valid tz")
    }

    fn floating(h: u32, m: u32) -> RawTime {
        RawTime::Floating(
            NaiveDate::from_ymd_opt(2026, 2, 17)
                .expect("valid date")
                .and_hms_opt(h, m, 0)
                .expect("valid time"),
        )
    }

    fn raw(start: Option<RawTime>) -> RawEvent {
        let mut event = RawEvent::new("work", Color::WHITE);
        event.start = start;
        event
    }

    #[test]
    fn missing_start_is_malformed() {
        let err = normalize(&raw(None), &berlin()).expect_err("no start");
        assert_eq!(err, MalformedEventError::MissingStart);
    }

    #[test]
    fn unparsable_start_is_malformed() {
        let err = normalize(&raw(Some(RawTime::Unparsable("soon".into()))), &berlin())
            .expect_err("bad start");
        assert_eq!(err, MalformedEventError::UnparsableStart("soon".into()));
    }

    #[test]
    fn timed_event_defaults_to_one_hour() {
        let interval = normalize(&raw(Some(floating(9, 0))), &berlin()).expect("normalize");
        assert!(!interval.all_day);
        assert_eq!(interval.duration(), Duration::hours(1));
        assert_eq!(interval.label, "Untitled");
    }

    #[test]
    fn duration_used_when_end_missing() {
        let mut event = raw(Some(floating(9, 0)));
        event.duration = Some(Duration::minutes(45));
        let interval = normalize(&event, &berlin()).expect("normalize");
        assert_eq!(interval.duration(), Duration::minutes(45));
    }

    #[test]
    fn all_day_defaults_to_next_midnight() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 28).expect("valid date");
        let interval =
            normalize(&raw(Some(RawTime::Date(day))), &berlin()).expect("normalize");
        assert!(interval.all_day);
        assert_eq!(interval.start.hour(), 0);
        assert_eq!(interval.end.hour(), 0);
        // 2026-03-29 is the spring-forward day in Berlin; still one calendar day
        assert_eq!(interval.end.date_naive(), day.succ_opt().expect("next"));
    }

    #[test]
    fn inverted_event_widened_to_one_minute() {
        let mut event = raw(Some(floating(10, 0)));
        event.end = Some(floating(9, 0));
        let interval = normalize(&event, &berlin()).expect("normalize");
        assert_eq!(interval.duration(), Duration::minutes(1));

        let mut zero = raw(Some(floating(10, 0)));
        zero.end = Some(floating(10, 0));
        let interval = normalize(&zero, &berlin()).expect("normalize");
        assert_eq!(interval.duration(), Duration::minutes(1));
    }

    #[test]
    fn utc_and_zoned_times_convert_to_display_zone() {
        let mut event = raw(Some(RawTime::Utc(
            Utc.with_ymd_and_hms(2026, 2, 17, 8, 0, 0)
                .single()
                .expect("valid utc"),
        )));
        event.end = Some(RawTime::Zoned {
            local: NaiveDate::from_ymd_opt(2026, 2, 17)
                .expect("valid date")
                .and_hms_opt(5, 0, 0)
                .expect("valid time"),
            tzid: "America/New_York".into(),
        });
        let interval = normalize(&event, &berlin()).expect("normalize");
        assert_eq!(interval.start.hour(), 9);
        assert_eq!(interval.end.hour(), 11);
    }

    #[test]
    fn ingest_skips_only_the_bad_event() {
        let events = vec![
            raw(Some(floating(9, 0))),
            raw(None),
            raw(Some(floating(11, 0))),
        ];
        let intervals = ingest(events, &berlin());
        assert_eq!(intervals.len(), 2);
    }
}
