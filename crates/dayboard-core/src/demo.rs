use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

use crate::color::Color;
use crate::event::{RawEvent, RawTime};

const DEMO_A: (&str, Color) = ("Demo A", Color::rgb(0xFE, 0xE2, 0x9B));
const DEMO_B: (&str, Color) = ("Demo B", Color::rgb(0xCD, 0xE7, 0xF5));
const DEMO_C: (&str, Color) = ("Demo C", Color::rgb(0xD5, 0xF5, 0xD0));
const DEMO_D: (&str, Color) = ("Demo D", Color::rgb(0xF5, 0xC9, 0xC9));

/// Fixed sample agenda around `now`'s local date, for running without any
/// calendar configured.
///
/// Times are relative to 09:00 on the local day, so the output only depends
/// on the date.
pub fn build_demo_events(now: DateTime<Tz>, tz: &Tz) -> Vec<RawEvent> {
    let today = now.with_timezone(tz).date_naive();
    let base = today.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN));
    let tomorrow = base + Duration::days(1);

    let mut events = vec![
        timed(base, (60, 120), "Daily sync (Teams)", DEMO_A),
        timed(base, (210, 300), "Project planning", DEMO_B),
        timed(base, (480, 570), "Customer call", DEMO_C),
        timed(base, (600, 720), "Evening class", DEMO_D),
        timed(tomorrow, (60, 150), "Sprint kickoff", DEMO_A),
        timed(tomorrow, (240, 300), "Design review", DEMO_B),
        timed(tomorrow, (540, 600), "Gym", DEMO_C),
    ];

    let mut holiday = RawEvent::new(DEMO_D.0, DEMO_D.1);
    holiday.uid = Some("demo-all-day".to_string());
    holiday.title = Some("Team offsite".to_string());
    holiday.start = Some(RawTime::Date(today));
    events.push(holiday);

    events
}

fn timed(
    base: NaiveDateTime,
    (from, to): (i64, i64),
    title: &str,
    (source, fill): (&str, Color),
) -> RawEvent {
    let mut event = RawEvent::new(source, fill);
    event.uid = Some(format!("demo-{}", title.to_ascii_lowercase().replace(' ', "-")));
    event.title = Some(title.to_string());
    event.start = Some(RawTime::Floating(base + Duration::minutes(from)));
    event.end = Some(RawTime::Floating(base + Duration::minutes(to)));
    event
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Timelike};

    use super::build_demo_events;
    use crate::day::Agenda;
    use crate::normalize::ingest;

    #[test]
    fn demo_agenda_spans_today_and_tomorrow() {
        let tz: chrono_tz::Tz = "Europe/London".parse().expect("valid tz");
        let now = tz
            .with_ymd_and_hms(2026, 2, 17, 6, 30, 0)
            .single()
            .expect("valid time");
        let intervals = ingest(build_demo_events(now, &tz), &tz);
        assert_eq!(intervals.len(), 8);

        let today = NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date");
        let agenda = Agenda::split(&intervals, today, &tz);
        assert_eq!(agenda.today.timed.len(), 4);
        assert_eq!(agenda.today.all_day.len(), 1);
        assert_eq!(agenda.tomorrow.timed.len(), 3);
        assert!(agenda.tomorrow.all_day.is_empty());

        assert_eq!(agenda.today.timed[0].label, "Daily sync (Teams)");
        assert_eq!(agenda.today.timed[0].start.hour(), 10);
        assert_eq!(agenda.today.timed[3].end.hour(), 21);
    }
}
