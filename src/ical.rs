//! iCalendar (RFC 5545) invitation parsing
//!
//! Meeting invitations arrive as `text/calendar` MIME parts containing a
//! VEVENT block. This extracts the fields the mirror needs, with
//! timezone-aware date handling: `Z`-suffixed values are UTC, a `TZID`
//! parameter selects a named zone, and bare values fall back to the
//! local zone. Malformed or missing date fields yield `None`, never an
//! error — invitation display degrades, item sync does not fail.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Fields extracted from a VEVENT block.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Invitation {
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub organizer_email: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Parse an iCalendar text into an [`Invitation`].
///
/// Honors RFC 5545 line folding (continuation lines starting with space
/// or tab join the previous line) before any field extraction. When a
/// `BEGIN:VEVENT` block exists only its contents are considered;
/// otherwise the whole input is scanned.
#[must_use]
pub fn parse_icalendar(text: &str) -> Invitation {
    let unfolded = unfold(text);
    let lines = vevent_lines(&unfolded);

    let mut invitation = Invitation::default();
    for line in lines {
        let Some((name_and_params, value)) = line.split_once(':') else {
            continue;
        };
        let mut params = name_and_params.split(';');
        let name = params.next().unwrap_or("").to_ascii_uppercase();
        let tzid = params.find_map(|p| p.strip_prefix("TZID=")).map(str::trim);

        match name.as_str() {
            "SUMMARY" => invitation.summary = Some(unescape(value)),
            "LOCATION" => invitation.location = Some(unescape(value)),
            "DESCRIPTION" => invitation.description = Some(unescape(value)),
            "ORGANIZER" => invitation.organizer_email = Some(organizer_email(value)),
            "DTSTART" => invitation.start = parse_datetime(value.trim(), tzid),
            "DTEND" => invitation.end = parse_datetime(value.trim(), tzid),
            _ => {}
        }
    }
    invitation
}

/// Join folded lines: a line starting with space or tab continues the
/// previous one.
fn unfold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix([' ', '\t']) {
            out.push_str(rest);
        } else {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
    }
    out
}

/// The lines inside the first VEVENT block, or all lines when no block
/// markers are present.
fn vevent_lines(unfolded: &str) -> Vec<&str> {
    let mut inside = false;
    let mut found_block = false;
    let mut block = Vec::new();
    for line in unfolded.lines() {
        let upper = line.trim().to_ascii_uppercase();
        if upper == "BEGIN:VEVENT" {
            inside = true;
            found_block = true;
            continue;
        }
        if upper == "END:VEVENT" {
            break;
        }
        if inside {
            block.push(line);
        }
    }
    if found_block {
        block
    } else {
        unfolded.lines().collect()
    }
}

/// Parse an iCalendar date or date-time value.
///
/// Accepted forms: `yyyymmddThhmmssZ` (UTC), `yyyymmddThhmmss`
/// (interpreted in `tzid` when given, else the local zone), and bare
/// `yyyymmdd` dates (midnight in the same zone selection).
fn parse_datetime(value: &str, tzid: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(utc_part) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc_part, "%Y%m%dT%H%M%S").ok()?;
        return Some(Utc.from_utc_datetime(&naive));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y%m%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    if let Some(tzid) = tzid {
        let tz = Tz::from_str(tzid).ok()?;
        return tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
    }

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Organizer value minus the `mailto:` scheme and parameters.
fn organizer_email(value: &str) -> String {
    let value = value.trim();
    let stripped = value
        .strip_prefix("mailto:")
        .or_else(|| value.strip_prefix("MAILTO:"))
        .unwrap_or(value);
    stripped.trim().to_string()
}

/// Undo RFC 5545 text escaping.
fn unescape(value: &str) -> String {
    value
        .trim()
        .replace("\\n", "\n")
        .replace("\\N", "\n")
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\\\", "\\")
}
