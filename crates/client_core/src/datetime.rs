//! Conversion between local wall-clock form text and UTC instants.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use shared::domain::{Todo, TodoDraft};
use thiserror::Error;

const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";
const INPUT_FORMAT_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DueDateError {
    #[error("`{0}` is not a date (expected YYYY-MM-DDTHH:MM or YYYY-MM-DD)")]
    Unparseable(String),
    #[error("`{0}` does not exist in the local time zone")]
    NonexistentLocalTime(String),
}

/// Parses local wall-clock text. Blank input means "no due date".
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
pub fn parse_local_input<Tz: TimeZone>(
    input: &str,
    tz: &Tz,
) -> Result<Option<DateTime<Utc>>, DueDateError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let naive = NaiveDateTime::parse_from_str(input, INPUT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(input, INPUT_FORMAT_SECONDS))
        .or_else(|_| {
            NaiveDate::parse_from_str(input, DATE_FORMAT)
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|_| DueDateError::Unparseable(input.to_string()))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| Some(local.with_timezone(&Utc)))
        .ok_or_else(|| DueDateError::NonexistentLocalTime(input.to_string()))
}

/// Renders an instant as `YYYY-MM-DDTHH:MM` in the given zone.
pub fn format_local_input<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format(INPUT_FORMAT).to_string()
}

pub fn format_local_date<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format(DATE_FORMAT).to_string()
}

/// Seeds the edit form from an existing record.
pub fn draft_from_todo<Tz: TimeZone>(todo: &Todo, tz: &Tz) -> TodoDraft
where
    Tz::Offset: std::fmt::Display,
{
    TodoDraft {
        title: todo.title.clone(),
        description: todo.description.clone().unwrap_or_default(),
        priority: Some(todo.priority),
        due_date_input: todo
            .due_date
            .map(|due| format_local_input(due, tz))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "tests/datetime_tests.rs"]
mod tests;
