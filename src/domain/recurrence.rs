use crate::domain::models::{
    parse_date, parse_hhmm, weekday_from_index, Reminder, RecurrencePattern,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("reminder '{0}' requires a date")]
    MissingDate(String),
    #[error("reminder '{0}' is recurring but has no recurrence pattern")]
    MissingPattern(String),
    #[error("reminder '{0}' is weekly but its weekday set is empty")]
    EmptyWeekdaySet(String),
    #[error("invalid time-of-day '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("weekday index {0} is out of range 0-6")]
    InvalidWeekday(u8),
}

/// Computes the next instant at which `reminder` should fire, evaluated
/// against the wall clock of `now`'s timezone. Pure: the same
/// `(reminder, now)` pair always yields the same result.
///
/// A one-time reminder whose `date@time` is already in the past is returned
/// as-is; the worker clamps the delay to zero so it fires on the next tick
/// instead of being silently dropped.
pub fn next_trigger<Tz: TimeZone>(
    reminder: &Reminder,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, RecurrenceError> {
    let time = parse_hhmm(&reminder.time)
        .ok_or_else(|| RecurrenceError::InvalidTime(reminder.time.clone()))?;

    if !reminder.recurring {
        let date = required_date(reminder)?;
        return resolve_local(&now, date, time);
    }

    match reminder.recurrence_pattern {
        None => Err(RecurrenceError::MissingPattern(reminder.id.clone())),
        Some(RecurrencePattern::Daily) => next_daily(&now, time),
        Some(RecurrencePattern::Weekly) => next_weekly(reminder, &now, time),
        Some(RecurrencePattern::Monthly) => {
            let anchor = required_date(reminder)?;
            next_monthly(&now, time, anchor.day())
        }
    }
}

fn next_daily<Tz: TimeZone>(
    now: &DateTime<Tz>,
    time: NaiveTime,
) -> Result<DateTime<Tz>, RecurrenceError> {
    let today = now.date_naive();
    let candidate = resolve_local(now, today, time)?;
    if candidate > *now {
        return Ok(candidate);
    }
    resolve_local(now, today + Duration::days(1), time)
}

fn next_weekly<Tz: TimeZone>(
    reminder: &Reminder,
    now: &DateTime<Tz>,
    time: NaiveTime,
) -> Result<DateTime<Tz>, RecurrenceError> {
    let days = reminder
        .recurring_days
        .as_deref()
        .filter(|days| !days.is_empty())
        .ok_or_else(|| RecurrenceError::EmptyWeekdaySet(reminder.id.clone()))?;

    let mut weekdays = HashSet::new();
    for day in days {
        let weekday =
            weekday_from_index(*day).ok_or(RecurrenceError::InvalidWeekday(*day))?;
        weekdays.insert(weekday);
    }

    // Offset 7 covers the wrap case where today's weekday is the only match
    // but today's time has already passed.
    let today = now.date_naive();
    for offset in 0..=7i64 {
        let date = today + Duration::days(offset);
        if !weekdays.contains(&date.weekday()) {
            continue;
        }
        let candidate = resolve_local(now, date, time)?;
        if candidate > *now {
            return Ok(candidate);
        }
    }
    Err(RecurrenceError::EmptyWeekdaySet(reminder.id.clone()))
}

fn next_monthly<Tz: TimeZone>(
    now: &DateTime<Tz>,
    time: NaiveTime,
    anchor_day: u32,
) -> Result<DateTime<Tz>, RecurrenceError> {
    let today = now.date_naive();
    let candidate = monthly_candidate(now, today.year(), today.month(), anchor_day, time)?;
    if candidate > *now {
        return Ok(candidate);
    }
    let (next_year, next_month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    monthly_candidate(now, next_year, next_month, anchor_day, time)
}

fn monthly_candidate<Tz: TimeZone>(
    now: &DateTime<Tz>,
    year: i32,
    month: u32,
    anchor_day: u32,
    time: NaiveTime,
) -> Result<DateTime<Tz>, RecurrenceError> {
    // Anchor days beyond the month's length clamp to the last day of the
    // month (a day-31 anchor fires on April 30).
    let day = anchor_day.min(days_in_month(year, month));
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| RecurrenceError::InvalidDate(format!("{year:04}-{month:02}-{day:02}")))?;
    resolve_local(now, date, time)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

fn required_date(reminder: &Reminder) -> Result<NaiveDate, RecurrenceError> {
    let raw = reminder
        .date
        .as_deref()
        .ok_or_else(|| RecurrenceError::MissingDate(reminder.id.clone()))?;
    parse_date(raw).ok_or_else(|| RecurrenceError::InvalidDate(raw.to_string()))
}

/// Resolves a wall-clock date+time in `now`'s timezone. An instant inside a
/// spring-forward gap shifts one hour later; an ambiguous fall-back instant
/// takes the earlier offset.
fn resolve_local<Tz: TimeZone>(
    now: &DateTime<Tz>,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<DateTime<Tz>, RecurrenceError> {
    let naive = NaiveDateTime::new(date, time);
    let timezone = now.timezone();
    if let Some(resolved) = timezone.from_local_datetime(&naive).earliest() {
        return Ok(resolved);
    }
    timezone
        .from_local_datetime(&(naive + Duration::hours(1)))
        .earliest()
        .ok_or_else(|| RecurrenceError::InvalidTime(time.format("%H:%M").to_string()))
}
