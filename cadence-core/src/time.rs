//! Time utilities: timezone-aware deadlines and work windows.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CoreError, Result};

/// Parse an IANA timezone like "America/Chicago".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| CoreError::InvalidTimezone(tz.to_string()))
}

/// Parse a deadline like "2026-02-20 23:59" in an IANA tz like "America/Chicago",
/// returning UTC.
pub fn parse_local_deadline_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz = parse_timezone(tz)?;

    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M").map_err(|e| {
        CoreError::InvalidDateTime {
            input: local.to_string(),
            reason: e.to_string(),
        }
    })?;

    local_to_utc(ndt, tz)
}

/// Resolve a wall-clock time in `tz` to UTC. Ambiguous (DST fold) times take
/// the earlier instant; nonexistent (DST gap) times are rejected.
pub fn local_to_utc(ndt: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&ndt)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| CoreError::InvalidDateTime {
            input: ndt.to_string(),
            reason: format!("nonexistent local time in {tz} (DST gap)"),
        })
}

/// Working hours for one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkWindow {
    pub date: NaiveDate,
    /// Local hour the window opens (0..=23).
    pub start_hour: u32,
    /// Local hour the window closes (1..=24, exclusive).
    pub end_hour: u32,
    pub tz: Tz,
}

impl WorkWindow {
    pub fn new(date: NaiveDate, start_hour: u32, end_hour: u32, tz: Tz) -> Result<Self> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(CoreError::InvalidWorkWindow(format!(
                "start {start_hour}:00 must be before end {end_hour}:00 (end <= 24)"
            )));
        }
        Ok(Self {
            date,
            start_hour,
            end_hour,
            tz,
        })
    }

    pub fn start_utc(&self) -> Result<DateTime<Utc>> {
        self.hour_utc(self.start_hour)
    }

    pub fn end_utc(&self) -> Result<DateTime<Utc>> {
        self.hour_utc(self.end_hour)
    }

    fn hour_utc(&self, hour: u32) -> Result<DateTime<Utc>> {
        // hour 24 is midnight of the following day.
        let (date, hour) = if hour == 24 {
            (self.date + Duration::days(1), 0)
        } else {
            (self.date, hour)
        };
        let time = NaiveTime::from_hms_opt(hour, 0, 0)
            .ok_or_else(|| CoreError::InvalidWorkWindow(format!("bad hour {hour}")))?;
        local_to_utc(date.and_time(time), self.tz)
    }
}

/// Helper: format a UTC time into RFC3339.
pub fn to_rfc3339_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chicago_deadline() {
        // Feb is CST (UTC-6)
        let utc = parse_local_deadline_to_utc("2026-02-20 23:59", "America/Chicago").unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-21T05:59:00+00:00");
    }

    #[test]
    fn bad_timezone_is_reported() {
        assert_eq!(
            parse_local_deadline_to_utc("2026-02-20 23:59", "Mars/Olympus"),
            Err(CoreError::InvalidTimezone("Mars/Olympus".into()))
        );
    }

    #[test]
    fn window_converts_local_hours() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let w = WorkWindow::new(date, 9, 17, chrono_tz::America::Chicago).unwrap();
        assert_eq!(to_rfc3339_utc(w.start_utc().unwrap()), "2026-02-20T15:00:00+00:00");
        assert_eq!(to_rfc3339_utc(w.end_utc().unwrap()), "2026-02-20T23:00:00+00:00");
    }

    #[test]
    fn window_end_24_is_next_midnight() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let w = WorkWindow::new(date, 20, 24, Tz::UTC).unwrap();
        assert_eq!(to_rfc3339_utc(w.end_utc().unwrap()), "2026-02-21T00:00:00+00:00");
    }

    #[test]
    fn window_rejects_inverted_hours() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        assert!(WorkWindow::new(date, 17, 9, Tz::UTC).is_err());
        assert!(WorkWindow::new(date, 9, 25, Tz::UTC).is_err());
    }
}
