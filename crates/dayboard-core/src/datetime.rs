use anyhow::anyhow;
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone
};
use chrono_tz::Tz;

/// Smallest step chrono can represent; used to turn an exclusive boundary
/// into an inclusive one.
pub fn tick() -> Duration {
  Duration::nanoseconds(1)
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return Err(anyhow!(
      "timezone is empty ({source})"
    ));
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Ok(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      Err(anyhow!(
        "unknown timezone id \
         {trimmed:?} ({source})"
      ))
    }
  }
}

/// Pins a wall-clock time to `tz`.
///
/// Ambiguous times (DST fall-back) take the earliest mapping. Times that fall
/// into a DST gap are moved forward until they exist.
pub fn localize(
  tz: &Tz,
  naive: NaiveDateTime
) -> DateTime<Tz> {
  let mut candidate = naive;
  // gaps are at most a few hours in every tzdb zone
  for _ in 0..48 {
    match tz
      .from_local_datetime(&candidate)
    {
      | LocalResult::Single(dt) => {
        return dt;
      }
      | LocalResult::Ambiguous(
        first,
        second
      ) => {
        tracing::debug!(
          first = %first,
          second = %second,
          "ambiguous local datetime; using earliest"
        );
        return if first <= second {
          first
        } else {
          second
        };
      }
      | LocalResult::None => {
        candidate += Duration::minutes(
          30
        );
      }
    }
  }

  tracing::warn!(
    local = %naive,
    timezone = %tz,
    "local datetime never resolved; \
     treating it as UTC"
  );
  tz.from_utc_datetime(&naive)
}

/// First instant of `day` in `tz`.
pub fn start_of_day(
  tz: &Tz,
  day: NaiveDate
) -> DateTime<Tz> {
  localize(
    tz,
    day.and_time(
      chrono::NaiveTime::MIN
    )
  )
}

/// Wall-clock `hour:00` on `day`; `hour == 24` is the next midnight.
pub fn hour_of_day(
  tz: &Tz,
  day: NaiveDate,
  hour: u32
) -> DateTime<Tz> {
  let midnight =
    day.and_time(chrono::NaiveTime::MIN);
  localize(
    tz,
    midnight
      + Duration::hours(i64::from(
        hour
      ))
  )
}
