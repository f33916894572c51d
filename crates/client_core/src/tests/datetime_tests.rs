use chrono::FixedOffset;

use super::*;
use crate::test_support::{at, todo};

fn tokyo() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("offset")
}

#[test]
fn local_input_round_trips_through_utc() {
    let tz = tokyo();
    let instant = parse_local_input("2025-07-03T10:54", &tz)
        .expect("parse")
        .expect("some instant");

    assert_eq!(instant, at(2025, 7, 3, 1, 54));
    assert_eq!(format_local_input(instant, &tz), "2025-07-03T10:54");
}

#[test]
fn date_only_input_means_local_midnight() {
    let tz = FixedOffset::west_opt(5 * 3600).expect("offset");
    let instant = parse_local_input("2025-07-03", &tz)
        .expect("parse")
        .expect("some instant");
    assert_eq!(instant, at(2025, 7, 3, 5, 0));
    assert_eq!(format_local_date(instant, &tz), "2025-07-03");
}

#[test]
fn seconds_are_accepted() {
    let instant = parse_local_input("2025-07-03T10:54:00", &tokyo())
        .expect("parse")
        .expect("some instant");
    assert_eq!(instant, at(2025, 7, 3, 1, 54));
}

#[test]
fn blank_input_means_no_due_date() {
    assert_eq!(parse_local_input("   ", &tokyo()), Ok(None));
}

#[test]
fn garbage_input_is_rejected() {
    assert_eq!(
        parse_local_input("next tuesday", &tokyo()),
        Err(DueDateError::Unparseable("next tuesday".to_string()))
    );
}

#[test]
fn draft_from_todo_renders_local_due_date() {
    let mut record = todo("a", "Pay rent");
    record.description = Some("before noon".to_string());
    record.priority = shared::domain::Priority::Urgent;
    record.due_date = Some(at(2025, 7, 3, 1, 54));

    let draft = draft_from_todo(&record, &tokyo());

    assert_eq!(draft.title, "Pay rent");
    assert_eq!(draft.description, "before noon");
    assert_eq!(draft.priority, Some(shared::domain::Priority::Urgent));
    assert_eq!(draft.due_date_input, "2025-07-03T10:54");
}

#[test]
fn draft_from_todo_without_due_date_leaves_input_empty() {
    let draft = draft_from_todo(&todo("a", "Anything"), &tokyo());
    assert!(draft.due_date_input.is_empty());
    assert!(draft.description.is_empty());
}
