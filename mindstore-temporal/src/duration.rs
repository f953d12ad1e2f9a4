//! Duration parsing (spec.md §4.8): `Nd`, `Nw`, `Nm`, `Ny`, or an ISO
//! date. Relative forms resolve against a caller-supplied `now` rather
//! than reading the clock directly, so the same parse is reproducible in
//! tests and in an as-of query.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use mindstore_core::errors::ValidationError;

/// Parses `input` into an absolute timestamp: a relative duration resolves
/// to `now + duration`, an ISO date or RFC 3339 timestamp resolves to the
/// literal instant.
pub fn resolve(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = input.trim();

    if let Some(delta) = parse_relative(trimmed) {
        return Ok(now + delta);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(ValidationError::MalformedDuration {
        value: input.to_string(),
    })
}

fn parse_relative(input: &str) -> Option<chrono::Duration> {
    if input.len() < 2 {
        return None;
    }
    let (digits, unit) = input.split_at(input.len() - 1);
    let n: i64 = digits.parse().ok()?;
    match unit {
        "d" => Some(chrono::Duration::days(n)),
        "w" => Some(chrono::Duration::weeks(n)),
        "m" => Some(chrono::Duration::days(n * 30)),
        "y" => Some(chrono::Duration::days(n * 365)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn relative_days() {
        let resolved = resolve("7d", now()).unwrap();
        assert_eq!(resolved, now() + chrono::Duration::days(7));
    }

    #[test]
    fn relative_weeks_months_years() {
        assert_eq!(resolve("2w", now()).unwrap(), now() + chrono::Duration::weeks(2));
        assert_eq!(resolve("1m", now()).unwrap(), now() + chrono::Duration::days(30));
        assert_eq!(resolve("1y", now()).unwrap(), now() + chrono::Duration::days(365));
    }

    #[test]
    fn iso_date_is_literal() {
        let resolved = resolve("2026-06-15", now()).unwrap();
        assert_eq!(resolved.date_naive(), NaiveDate::from_ymd_opt(2026, 6, 15).unwrap());
    }

    #[test]
    fn unknown_form_is_an_error() {
        assert!(resolve("soonish", now()).is_err());
        assert!(resolve("3x", now()).is_err());
    }
}
