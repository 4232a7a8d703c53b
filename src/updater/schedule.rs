//! Weekday hourly schedule for the updater.
//!
//! Supports the cron subset the updater needs: a fixed minute, an hour or
//! hour range, and a day-of-week list or range, e.g. `0 4-10 * * MON-FRI`.
//! Day-of-month and month must be `*` or `?`. Times are evaluated in a fixed
//! UTC offset.

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Utc, Weekday};
use std::future::Future;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_CRON: &str = "0 4-10 * * MON-FRI";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("expected 5 cron fields, got {0}")]
    FieldCount(usize),
    #[error("invalid minute '{0}'")]
    Minute(String),
    #[error("invalid hour field '{0}'")]
    Hour(String),
    #[error("unsupported {field} field '{value}', only * or ? is allowed")]
    Unsupported { field: &'static str, value: String },
    #[error("invalid day-of-week field '{0}'")]
    Weekday(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    minute: u32,
    hours: RangeInclusive<u32>,
    weekdays: Vec<Weekday>,
    offset: FixedOffset,
}

impl Schedule {
    pub fn new(
        minute: u32,
        hours: RangeInclusive<u32>,
        weekdays: Vec<Weekday>,
        offset: FixedOffset,
    ) -> Result<Self, ScheduleError> {
        if minute > 59 {
            return Err(ScheduleError::Minute(minute.to_string()));
        }
        if hours.start() > hours.end() || *hours.end() > 23 {
            return Err(ScheduleError::Hour(format!("{}-{}", hours.start(), hours.end())));
        }
        if weekdays.is_empty() {
            return Err(ScheduleError::Weekday(String::new()));
        }
        Ok(Self {
            minute,
            hours,
            weekdays,
            offset,
        })
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// First fire time strictly after `now`, searching one week ahead.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = now.with_timezone(&self.offset);
        let mut date = local.date_naive();

        for _ in 0..8 {
            if self.weekdays.contains(&date.weekday()) {
                for hour in self.hours.clone() {
                    let Some(naive) = date.and_hms_opt(hour, self.minute, 0) else {
                        continue;
                    };
                    let Some(candidate) = self.offset.from_local_datetime(&naive).single() else {
                        continue;
                    };
                    if candidate > local {
                        return Some(candidate.with_timezone(&Utc));
                    }
                }
            }
            date = date.succ_opt()?;
        }

        None
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            minute: 0,
            hours: 4..=10,
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            offset: Utc.fix(),
        }
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s {
        "0" | "7" => Some(Weekday::Sun),
        "1" => Some(Weekday::Mon),
        "2" => Some(Weekday::Tue),
        "3" => Some(Weekday::Wed),
        "4" => Some(Weekday::Thu),
        "5" => Some(Weekday::Fri),
        "6" => Some(Weekday::Sat),
        name => name.parse().ok(),
    }
}

fn parse_weekdays(field: &str) -> Result<Vec<Weekday>, ScheduleError> {
    let invalid = || ScheduleError::Weekday(field.to_string());

    if field == "*" || field == "?" {
        return Ok(vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]);
    }

    let mut days = Vec::new();
    for part in field.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_weekday(start).ok_or_else(invalid)?;
                let end = parse_weekday(end).ok_or_else(invalid)?;
                let mut day = start;
                loop {
                    days.push(day);
                    if day == end {
                        break;
                    }
                    day = day.succ();
                    if day == start {
                        return Err(invalid());
                    }
                }
            }
            None => days.push(parse_weekday(part).ok_or_else(invalid)?),
        }
    }
    Ok(days)
}

fn parse_hours(field: &str) -> Result<RangeInclusive<u32>, ScheduleError> {
    let invalid = || ScheduleError::Hour(field.to_string());
    if field == "*" {
        return Ok(0..=23);
    }
    let (start, end) = field.split_once('-').unwrap_or((field, field));
    let start: u32 = start.parse().map_err(|_| invalid())?;
    let end: u32 = end.parse().map_err(|_| invalid())?;
    Ok(start..=end)
}

/// `0/60` (every 60 minutes from 0) is accepted as minute 0.
fn parse_minute(field: &str) -> Result<u32, ScheduleError> {
    let base = match field.split_once('/') {
        Some((base, step)) if step == "60" => base,
        Some(_) => return Err(ScheduleError::Minute(field.to_string())),
        None => field,
    };
    base.parse().map_err(|_| ScheduleError::Minute(field.to_string()))
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }

        for (field, value) in [("day-of-month", fields[2]), ("month", fields[3])] {
            if value != "*" && value != "?" {
                return Err(ScheduleError::Unsupported {
                    field,
                    value: value.to_string(),
                });
            }
        }

        Schedule::new(
            parse_minute(fields[0])?,
            parse_hours(fields[1])?,
            parse_weekdays(&fields[4].to_ascii_uppercase())?,
            Utc.fix(),
        )
    }
}

/// Sleeps until each fire time and runs `job`, until `shutdown` resolves.
///
/// Job errors are logged; the loop keeps going.
pub async fn run_scheduled<F, Fut, S>(schedule: &Schedule, mut job: F, shutdown: S)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            error!("Schedule has no upcoming fire time");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next, wait_secs = wait.as_secs(), "Waiting for next scheduled run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = job().await {
                    error!(error = %e, "Scheduled run failed");
                }
            }
            _ = &mut shutdown => {
                info!("Scheduler shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_default_cron() {
        let schedule: Schedule = DEFAULT_CRON.parse().unwrap();
        assert_eq!(schedule, Schedule::default());

        let aws_style: Schedule = "0/60 04-10 ? * MON-FRI".parse().unwrap();
        assert_eq!(aws_style, Schedule::default());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("0 4 * *".parse::<Schedule>(), Err(ScheduleError::FieldCount(4)));
        assert!(matches!(
            "0 4 1 * *".parse::<Schedule>(),
            Err(ScheduleError::Unsupported { .. })
        ));
        assert!(matches!("0 4-30 * * *".parse::<Schedule>(), Err(ScheduleError::Hour(_))));
        assert!(matches!("0/15 4 * * *".parse::<Schedule>(), Err(ScheduleError::Minute(_))));
        assert!(matches!("0 4 * * FOO".parse::<Schedule>(), Err(ScheduleError::Weekday(_))));
    }

    #[test]
    fn test_next_within_window() {
        let schedule = Schedule::default();
        // Wednesday
        let next = schedule.next_after(utc("2025-01-15T05:30:00Z")).unwrap();
        assert_eq!(next, utc("2025-01-15T06:00:00Z"));
    }

    #[test]
    fn test_next_skips_to_following_day_and_weekend() {
        let schedule = Schedule::default();
        let next = schedule.next_after(utc("2025-01-15T10:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-01-16T04:00:00Z"));

        // Friday evening rolls over to Monday
        let next = schedule.next_after(utc("2025-01-17T11:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-01-20T04:00:00Z"));
    }

    #[test]
    fn test_next_in_offset() {
        let sgt = FixedOffset::east_opt(8 * 3600).unwrap();
        let schedule = Schedule::default().with_offset(sgt);
        // 03:00 SGT on a Wednesday
        let next = schedule.next_after(utc("2025-01-14T19:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-01-14T20:00:00Z"));
    }

    #[test]
    fn test_weekday_wraparound_range() {
        let schedule: Schedule = "0 4 * * SAT-MON".parse().unwrap();
        let next = schedule.next_after(utc("2025-01-15T00:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-01-18T04:00:00Z"));
    }

    #[tokio::test]
    async fn test_run_scheduled_stops_on_shutdown() {
        let mut runs = 0;
        run_scheduled(
            &Schedule::default(),
            || {
                runs += 1;
                async { Ok(()) }
            },
            async {},
        )
        .await;
        assert_eq!(runs, 0);
    }
}
