use std::io::BufReader;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ical::IcalParser;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CalendarConfig;
use crate::event::{RawEvent, RawTime};

const USER_AGENT: &str = concat!("dayboard/", env!("CARGO_PKG_VERSION"));

/// Where a calendar document lives once its configured URL is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    /// Candidate URLs, tried in order.
    Http(Vec<String>),
    File(PathBuf),
}

/// Normalizes a configured calendar location. `webcal://` becomes https with
/// an http fallback, `webcals://` becomes https, `file://` and bare paths are
/// read from disk.
pub fn locate(raw: &str) -> anyhow::Result<FeedLocation> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("calendar location is empty");
    }
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("webcal://") {
        let remainder = &trimmed["webcal://".len()..];
        return Ok(FeedLocation::Http(vec![
            format!("https://{remainder}"),
            format!("http://{remainder}"),
        ]));
    }

    if lower.starts_with("webcals://") {
        let remainder = &trimmed["webcals://".len()..];
        return Ok(FeedLocation::Http(vec![format!("https://{remainder}")]));
    }

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(FeedLocation::Http(vec![trimmed.to_string()]));
    }

    if lower.starts_with("file://") {
        return Ok(FeedLocation::File(PathBuf::from(&trimmed["file://".len()..])));
    }

    if trimmed.contains("://") {
        bail!("unsupported calendar scheme: {trimmed}");
    }

    Ok(FeedLocation::File(PathBuf::from(trimmed)))
}

/// Fetches and decodes every configured calendar. A calendar that fails to
/// load is logged and contributes nothing.
#[instrument(skip_all, fields(calendars = calendars.len()))]
pub async fn fetch_all(calendars: &[CalendarConfig], timeout: Duration) -> Vec<RawEvent> {
    let client = match reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
    {
        Ok(client) => Some(client),
        Err(err) => {
            error!(error = %err, "failed building HTTP client; only file calendars will load");
            None
        }
    };

    let mut events = Vec::new();
    for calendar in calendars {
        match fetch_calendar(client.as_ref(), calendar).await {
            Ok(mut fetched) => {
                info!(
                    calendar = %calendar.name,
                    events = fetched.len(),
                    "loaded calendar"
                );
                events.append(&mut fetched);
            }
            Err(err) => {
                error!(
                    calendar = %calendar.name,
                    error = format!("{err:#}"),
                    "failed to load calendar"
                );
            }
        }
    }
    events
}

#[instrument(skip(client, calendar), fields(calendar = %calendar.name))]
async fn fetch_calendar(
    client: Option<&reqwest::Client>,
    calendar: &CalendarConfig,
) -> anyhow::Result<Vec<RawEvent>> {
    let text = match locate(&calendar.url)? {
        FeedLocation::File(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        FeedLocation::Http(candidates) => {
            let client = client.ok_or_else(|| anyhow!("no HTTP client available"))?;
            fetch_http(client, &candidates).await?
        }
    };
    decode_events(&text, calendar)
}

async fn fetch_http(client: &reqwest::Client, candidates: &[String]) -> anyhow::Result<String> {
    let mut last_error = None::<anyhow::Error>;

    for candidate in candidates {
        let response = match client
            .get(candidate.as_str())
            .header(reqwest::header::ACCEPT, "text/calendar, text/plain, */*;q=0.8")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(candidate = %candidate, error = %err, "calendar request failed");
                last_error = Some(
                    anyhow::Error::new(err)
                        .context(format!("failed requesting calendar URL: {candidate}")),
                );
                continue;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(candidate = %candidate, status = %status, "calendar URL returned non-success status");
            last_error = Some(anyhow!("calendar URL returned HTTP {status} for {candidate}"));
            continue;
        }

        return response
            .text()
            .await
            .with_context(|| format!("failed reading calendar body from {candidate}"));
    }

    Err(last_error.unwrap_or_else(|| anyhow!("no calendar URL candidates to try")))
}

/// Decodes an iCalendar document into raw events tagged with the calendar's
/// name and color.
pub fn decode_events(ics_text: &str, calendar: &CalendarConfig) -> anyhow::Result<Vec<RawEvent>> {
    let mut events = Vec::new();
    let parser = IcalParser::new(BufReader::new(ics_text.as_bytes()));

    for parsed in parser {
        let parsed = parsed.context("failed parsing iCalendar payload")?;
        for event in &parsed.events {
            events.push(decode_event(event, calendar));
        }
    }

    debug!(calendar = %calendar.name, count = events.len(), "decoded events");
    Ok(events)
}

fn decode_event(event: &IcalEvent, calendar: &CalendarConfig) -> RawEvent {
    let props = &event.properties;
    let mut raw = RawEvent::new(calendar.name.clone(), calendar.color);
    raw.uid = property_value(props, "UID");
    raw.title = property_value(props, "SUMMARY");
    raw.start = find_property(props, "DTSTART").map(parse_ics_time);
    raw.end = find_property(props, "DTEND").map(parse_ics_time);
    raw.duration = property_value(props, "DURATION").and_then(|value| {
        let parsed = parse_ics_duration(&value);
        if parsed.is_none() {
            warn!(uid = ?raw.uid, duration = %value, "ignoring unparsable DURATION");
        }
        parsed
    });

    if find_property(props, "RRULE").is_some() {
        debug!(uid = ?raw.uid, "recurring event; only the first occurrence is shown");
    }

    raw
}

/// Decodes a `DTSTART`/`DTEND` property value.
pub fn parse_ics_time(property: &Property) -> RawTime {
    let Some(raw) = property.value.as_deref().map(str::trim) else {
        return RawTime::Unparsable(String::new());
    };
    if raw.is_empty() {
        return RawTime::Unparsable(String::new());
    }

    let date_typed = param_value(property, "VALUE")
        .is_some_and(|value| value.eq_ignore_ascii_case("DATE"));
    if date_typed || (raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit())) {
        return NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map(RawTime::Date)
            .unwrap_or_else(|_| RawTime::Unparsable(raw.to_string()));
    }

    if raw.ends_with('Z')
        && let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ")
    {
        return RawTime::Utc(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S") {
        return match param_value(property, "TZID") {
            Some(tzid) => RawTime::Zoned { local: naive, tzid },
            None => RawTime::Floating(naive),
        };
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return RawTime::Utc(parsed.with_timezone(&Utc));
    }

    RawTime::Unparsable(raw.to_string())
}

/// Parses an RFC 5545 duration such as `PT1H30M`, `P1D` or `-PT15M`.
pub fn parse_ics_duration(raw: &str) -> Option<chrono::Duration> {
    static DURATION_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DURATION_RE
        .get_or_init(|| {
            Regex::new(
                r"^(?P<sign>[+-])?P(?:(?P<weeks>\d+)W)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)S)?)?$",
            )
            .ok()
        })
        .as_ref()?;

    let caps = re.captures(raw.trim())?;
    let mut total = chrono::Duration::zero();
    let mut matched = false;
    for (name, unit) in [
        ("weeks", 7 * 86_400),
        ("days", 86_400),
        ("hours", 3_600),
        ("minutes", 60),
        ("seconds", 1),
    ] {
        if let Some(value) = caps.name(name) {
            let amount: i64 = value.as_str().parse().ok()?;
            total += chrono::Duration::seconds(amount.checked_mul(unit)?);
            matched = true;
        }
    }

    if !matched {
        return None;
    }
    if caps.name("sign").is_some_and(|sign| sign.as_str() == "-") {
        total = -total;
    }
    Some(total)
}

fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|property| property.name == name)
}

fn property_value(properties: &[Property], name: &str) -> Option<String> {
    find_property(properties, name)?
        .value
        .as_ref()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn param_value(property: &Property, key: &str) -> Option<String> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim().to_string())
}
