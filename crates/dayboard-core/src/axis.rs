use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::datetime::hour_of_day;
use crate::event::Interval;

/// Visible hours, `[start_hour, end_hour)`, with `end_hour <= 24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Vertical pixel rows `[top, bottom)` the window is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBand {
    pub top: i32,
    pub bottom: i32,
}

impl PixelBand {
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerticalSpan {
    pub y1: i32,
    pub y2: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct AxisMapper {
    window: HourWindow,
    band: PixelBand,
    min_height: i32,
}

impl AxisMapper {
    pub fn new(window: HourWindow, band: PixelBand, min_height: u32) -> Self {
        Self {
            window,
            band,
            min_height: i32::try_from(min_height).unwrap_or(i32::MAX),
        }
    }

    pub fn window(&self) -> HourWindow {
        self.window
    }

    /// Maps an instant against the window as it falls on `day`.
    pub fn map_instant(&self, instant: DateTime<Tz>, day: NaiveDate, tz: &Tz) -> i32 {
        let (start, end) = self.window_instants(day, tz);
        let total = (end - start).num_seconds();
        self.project((instant - start).num_seconds(), total)
    }

    /// Pixel span for `interval` drawn in `day`'s column.
    ///
    /// Both edges are clamped into the band. Spans shorter than the minimum
    /// height grow downwards; if that would cross the band bottom the span is
    /// pinned to the bottom and grows upwards instead, and a band shorter than
    /// the minimum is used whole.
    pub fn span(&self, interval: &Interval, day: NaiveDate, tz: &Tz) -> VerticalSpan {
        let y1 = self.map_instant(interval.start, day, tz);
        let y2 = self.map_instant(interval.end, day, tz);
        self.enforce_min_height(y1, y2)
    }

    fn enforce_min_height(&self, y1: i32, y2: i32) -> VerticalSpan {
        if y2 - y1 >= self.min_height {
            return VerticalSpan { y1, y2 };
        }

        let grown = y1.saturating_add(self.min_height);
        if grown <= self.band.bottom {
            return VerticalSpan { y1, y2: grown };
        }

        VerticalSpan {
            y1: (self.band.bottom - self.min_height).max(self.band.top),
            y2: self.band.bottom,
        }
    }

    fn window_instants(&self, day: NaiveDate, tz: &Tz) -> (DateTime<Tz>, DateTime<Tz>) {
        (
            hour_of_day(tz, day, self.window.start_hour),
            hour_of_day(tz, day, self.window.end_hour),
        )
    }

    fn project(&self, seconds: i64, total: i64) -> i32 {
        if total <= 0 {
            return self.band.top;
        }
        let clamped = seconds.clamp(0, total);
        let offset = clamped * i64::from(self.band.height()) / total;
        self.band.top + offset as i32
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Tz;

    use super::{AxisMapper, HourWindow, PixelBand, VerticalSpan};
    use crate::color::Color;
    use crate::event::Interval;

    fn mapper(min_height: u32) -> AxisMapper {
        AxisMapper::new(
            HourWindow {
                start_hour: 7,
                end_hour: 22,
            },
            PixelBand {
                top: 100,
                bottom: 1000,
            },
            min_height,
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date")
    }

    fn at(d: u32, h: u32, m: u32) -> chrono::DateTime<Tz> {
        chrono_tz::UTC
            .with_ymd_and_hms(2026, 2, d, h, m, 0)
            .single()
            .expect("valid time")
    }

    fn event(start: chrono::DateTime<Tz>, end: chrono::DateTime<Tz>) -> Interval {
        Interval::new(start, end, false, "e", "cal", Color::WHITE)
    }

    #[test]
    fn maps_nine_am_into_band() {
        assert_eq!(mapper(6).map_instant(at(17, 9, 0), day(), &chrono_tz::UTC), 220);
    }

    #[test]
    fn clamps_times_outside_window() {
        let tz = chrono_tz::UTC;
        assert_eq!(mapper(6).map_instant(at(17, 5, 0), day(), &tz), 100);
        assert_eq!(mapper(6).map_instant(at(17, 23, 30), day(), &tz), 1000);
    }

    #[test]
    fn overnight_event_is_truncated_in_both_days() {
        let overnight = event(at(16, 21, 0), at(17, 8, 0));
        let yesterday = NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date");
        let tz = chrono_tz::UTC;

        assert_eq!(
            mapper(6).span(&overnight, yesterday, &tz),
            VerticalSpan { y1: 940, y2: 1000 }
        );
        assert_eq!(
            mapper(6).span(&overnight, day(), &tz),
            VerticalSpan { y1: 100, y2: 160 }
        );
    }

    #[test]
    fn short_event_grows_to_min_height() {
        let blip = event(at(17, 12, 0), at(17, 12, 1));
        let span = mapper(6).span(&blip, day(), &chrono_tz::UTC);
        assert_eq!(span.y2 - span.y1, 6);
    }

    #[test]
    fn min_height_never_crosses_band_bottom() {
        let last_minute = event(at(17, 21, 59), at(17, 22, 0));
        let span = mapper(6).span(&last_minute, day(), &chrono_tz::UTC);
        assert_eq!(span, VerticalSpan { y1: 994, y2: 1000 });

        let cramped = AxisMapper::new(
            HourWindow {
                start_hour: 7,
                end_hour: 8,
            },
            PixelBand { top: 0, bottom: 4 },
            6,
        );
        let span = cramped.span(&last_minute, day(), &chrono_tz::UTC);
        assert_eq!(span, VerticalSpan { y1: 0, y2: 4 });
    }
}
