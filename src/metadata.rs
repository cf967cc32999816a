//! Lesson metadata parsing.
//!
//! Each lesson folder may hold a small JSON object (`metadata.json` by
//! default) with whatever the teacher wants shown next to the lesson:
//!
//! ```json
//! { "due_date": "01-09-25", "pages": "12-14" }
//! ```
//!
//! Keys are passed through to the class document untouched. The only key this
//! module understands is `due_date`, from which it derives a display string
//! with the Hebrew weekday name:
//!
//! ```text
//! "01-09-25"   → "יום שני, 01.09.2025"
//! "01.09.2025" → "יום שני, 01.09.2025"
//! "1.9.2025"   → ""   (day and month take two digits)
//! "31-13-2025" → ""   (no such month)
//! ```
//!
//! Nothing in here fails: a file that isn't a JSON object yields an empty
//! record, and a due date that doesn't parse yields no display string.

use crate::types::LessonMetadata;
use chrono::{Datelike, NaiveDate};
use serde_json::Value;

/// Weekday names indexed by days from Monday.
const WEEKDAYS_HE: [&str; 7] = [
    "יום שני",
    "יום שלישי",
    "יום רביעי",
    "יום חמישי",
    "יום שישי",
    "יום שבת",
    "יום ראשון",
];

/// Parse a metadata file. Anything other than a JSON object yields an empty
/// record.
pub fn parse_metadata(text: &str) -> LessonMetadata {
    let map = match serde_json::from_str::<Value>(text.trim_start_matches('\u{feff}')) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            log::debug!("metadata is not a JSON object, ignoring");
            return LessonMetadata::default();
        }
        Err(e) => {
            log::debug!("metadata does not parse ({e}), ignoring");
            return LessonMetadata::default();
        }
    };

    let mut extra: std::collections::BTreeMap<String, Value> = map.into_iter().collect();
    let due_date = match extra.remove("due_date") {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            extra.insert("due_date".to_string(), other);
            None
        }
        None => None,
    };
    // Recomputed from due_date on every parse; a stale value from the file
    // would disagree with it.
    extra.remove("due_date_display");

    let due_date_display = due_date
        .as_deref()
        .and_then(format_due_date)
        .unwrap_or_default();

    LessonMetadata {
        due_date,
        due_date_display,
        extra,
    }
}

/// Parse `dd-mm-yyyy` / `dd.mm.yyyy` (two-digit years are 20yy).
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let sep = if raw.contains('-') { '-' } else { '.' };
    let parts: Vec<&str> = raw.split(sep).collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !(all_digits(day) && all_digits(month) && all_digits(year)) {
        return None;
    }
    if day.len() != 2 || month.len() != 2 {
        return None;
    }
    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// `"<weekday>, dd.mm.yyyy"` for a raw due date, or `None` if it doesn't parse.
pub fn format_due_date(raw: &str) -> Option<String> {
    let date = parse_due_date(raw)?;
    let weekday = WEEKDAYS_HE[date.weekday().num_days_from_monday() as usize];
    Some(format!("{}, {}", weekday, date.format("%d.%m.%Y")))
}
