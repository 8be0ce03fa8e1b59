//! Human-relative rendering of past instants ("3 days ago").

use chrono::{DateTime, SecondsFormat, Utc};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Describe how long before `now` the instant `then` was.
///
/// Instants less than a minute old, or in the future, read "just now".
pub fn format_time_span(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    let (amount, unit) = match secs {
        s if s < MINUTE => return "just now".to_string(),
        s if s < HOUR => (s / MINUTE, "minute"),
        s if s < DAY => (s / HOUR, "hour"),
        s if s < MONTH => (s / DAY, "day"),
        s if s < YEAR => (s / MONTH, "month"),
        s => (s / YEAR, "year"),
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural} ago")
}

/// The storage form of a timestamp: RFC 3339, UTC, millisecond precision.
pub fn to_stored(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. Anything that is not RFC 3339 yields `None`.
pub fn from_stored(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn base() -> DateTime<Utc> {
        from_stored("2024-06-01T12:00:00.000Z").unwrap()
    }

    fn span(delta: TimeDelta) -> String {
        format_time_span(base() - delta, base())
    }

    #[test]
    fn recent_and_future_are_just_now() {
        assert_eq!(span(TimeDelta::seconds(59)), "just now");
        assert_eq!(span(TimeDelta::seconds(-300)), "just now");
    }

    #[test]
    fn units_and_plurals() {
        assert_eq!(span(TimeDelta::minutes(1)), "1 minute ago");
        assert_eq!(span(TimeDelta::minutes(59)), "59 minutes ago");
        assert_eq!(span(TimeDelta::hours(1)), "1 hour ago");
        assert_eq!(span(TimeDelta::days(3)), "3 days ago");
        assert_eq!(span(TimeDelta::days(45)), "1 month ago");
        assert_eq!(span(TimeDelta::days(800)), "2 years ago");
    }

    #[test]
    fn stored_form_round_trips() {
        let raw = to_stored(base());
        assert_eq!(raw, "2024-06-01T12:00:00.000Z");
        assert_eq!(from_stored(&raw), Some(base()));
        assert_eq!(from_stored("yesterday"), None);
    }
}
