use std::{cmp::Ordering, fmt};

use chrono::{DateTime, Utc};
use shared::domain::Todo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::All, Filter::Active, Filter::Completed];

    /// Accepts `pending` as an alias of `active`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Filter::All),
            "active" | "pending" => Some(Filter::Active),
            "completed" | "done" => Some(Filter::Completed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Active => "Active",
            Filter::Completed => "Completed",
        }
    }

    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.completed,
            Filter::Completed => todo.completed,
        }
    }

    pub fn count_in(self, records: &[Todo]) -> usize {
        records.iter().filter(|todo| self.matches(todo)).count()
    }

    pub fn empty_state_text(self) -> &'static str {
        match self {
            Filter::All => "No to-dos yet. Add one above to get started.",
            Filter::Active => "No active to-dos. Everything is done!",
            Filter::Completed => "No completed to-dos yet.",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn filter_todos(records: &[Todo], filter: Filter) -> Vec<&Todo> {
    records.iter().filter(|todo| filter.matches(todo)).collect()
}

/// Open items first, newest first within each group, id as tie-break.
pub fn compare_for_display(a: &Todo, b: &Todo) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn visible_todos(records: &[Todo], filter: Filter) -> Vec<&Todo> {
    let mut visible = filter_todos(records, filter);
    visible.sort_by(|a, b| compare_for_display(a, b));
    visible
}

pub fn is_overdue(todo: &Todo, now: DateTime<Utc>) -> bool {
    !todo.completed && todo.due_date.is_some_and(|due| due < now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TodoStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub overdue: usize,
}

impl TodoStats {
    pub fn compute(records: &[Todo], now: DateTime<Utc>) -> Self {
        records.iter().fold(Self::default(), |mut stats, todo| {
            stats.total += 1;
            if todo.completed {
                stats.completed += 1;
            } else {
                stats.active += 1;
            }
            if is_overdue(todo, now) {
                stats.overdue += 1;
            }
            stats
        })
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
