//! Best-effort conversion of raw date values into UTC instants.
//!
//! Values that carry an offset are converted to UTC preserving the instant.
//! Values without any timezone information are *assumed to be UTC*; no
//! attempt is made to infer a site's local timezone. Date-only values resolve
//! to midnight UTC. Anything unparseable yields `None`.

use crate::{RawDateValue, RawValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

// Unix timestamps outside [1990-01-01, 2100-01-01) are treated as noise.
const EPOCH_MIN_SECS: i64 = 631_152_000;
const EPOCH_MAX_SECS: i64 = 4_102_444_800;
const MILLIS_THRESHOLD: i64 = 100_000_000_000;
const MAX_INPUT_LEN: usize = 80;

static ORDINAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid ordinal regex"));
static LEADING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:last\s+updated|last\s+modified|updated|published|posted|modified)(?:\s+on)?\s*:?\s*")
        .expect("valid label regex")
});

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %H:%M",
    "%B %d, %Y, %I:%M %p",
    "%d %B %Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%A, %B %d, %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
];

/// Normalize an extracted value to a UTC instant.
///
/// ```
/// use lastmod_extract::{normalize, RawDateValue};
///
/// let raw = RawDateValue::text("2023-08-15T12:00:00+02:00", "meta:date");
/// let at = normalize(Some(&raw)).unwrap();
/// assert_eq!(at.to_rfc3339(), "2023-08-15T10:00:00+00:00");
///
/// assert!(normalize(None).is_none());
/// assert!(normalize(Some(&RawDateValue::text("not a date", "x"))).is_none());
/// ```
pub fn normalize(value: Option<&RawDateValue>) -> Option<DateTime<Utc>> {
    let raw = value?;
    match &raw.value {
        RawValue::Text(s) => parse_date_str(s),
        RawValue::Instant(dt) => Some(dt.with_timezone(&Utc)),
        RawValue::Naive(ndt) => Some(DateTime::<Utc>::from_naive_utc_and_offset(*ndt, Utc)),
        RawValue::Timestamp(n) => from_epoch(*n),
    }
}

/// Parse a free-form date string; see the module docs for the timezone policy.
pub fn parse_date_str(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if trimmed.is_empty() || trimmed.len() > MAX_INPUT_LEN {
        return None;
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return match trimmed.len() {
            10 | 13 => trimmed.parse::<i64>().ok().and_then(from_epoch),
            _ => None,
        };
    }

    let cleaned = clean(trimmed);
    let s = cleaned.as_str();

    // Try RFC3339 first (handles offsets like +00:00 and `Z`)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // RFC2822 covers HTTP dates: `Tue, 15 Aug 2023 10:00:00 GMT`
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = strip_utc_designator(s);
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(naive, fmt) {
            let ndt = date.and_hms_opt(0, 0, 0)?;
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
        }
    }
    None
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    let dt = if n.abs() >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(n)?
    } else {
        DateTime::from_timestamp(n, 0)?
    };
    let secs = dt.timestamp();
    (EPOCH_MIN_SECS..EPOCH_MAX_SECS).contains(&secs).then_some(dt)
}

fn clean(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let unlabeled = LEADING_LABEL.replace(&collapsed, "");
    ORDINAL_SUFFIX.replace_all(&unlabeled, "$1").into_owned()
}

/// `2023-08-15 10:00 UTC` and friends are naive forms with an explicit UTC marker.
fn strip_utc_designator(s: &str) -> &str {
    for suffix in [" UTC", " GMT", " utc", " gmt", "Z", "z"] {
        if let Some(rest) = s.strip_suffix(suffix) {
            return rest.trim_end();
        }
    }
    s
}
