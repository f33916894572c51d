//! Turns user intents into exactly one remote mutation each.
//!
//! The orchestrator never touches the store. Created and updated records
//! arrive through their subscription echo; a successful delete hands back a
//! local removal effect for the caller to apply.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use serde::Serialize;
use shared::{
    domain::{Todo, TodoDraft},
    error::ErrorClassification,
    protocol::{
        format_instant, CreateTodoInput, DeleteTodoInput, Operation, UpdateTodoInput, CREATE_TODO,
        DELETE_TODO, UPDATE_TODO,
    },
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    datetime::{format_local_input, parse_local_input, DueDateError},
    error::ClientError,
    notice::Notice,
    store::SyncEvent,
    transport::GraphqlTransport,
};

pub const SESSION_EXPIRED_TEXT: &str = "Your session has expired. Please sign in again.";
pub const INVALID_DUE_DATE_TEXT: &str = "Invalid due date format.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("Title is required.")]
    EmptyTitle,
    #[error(transparent)]
    DueDate(#[from] DueDateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Toggle,
    Delete,
}

impl MutationKind {
    fn failure_prefix(self) -> &'static str {
        match self {
            MutationKind::Create => "Failed to save to-do",
            MutationKind::Update | MutationKind::Toggle => "Failed to update to-do",
            MutationKind::Delete => "Failed to delete to-do",
        }
    }

    fn success_text(self) -> &'static str {
        match self {
            MutationKind::Create => "To-do created.",
            MutationKind::Update => "To-do updated.",
            MutationKind::Toggle => "To-do status updated.",
            MutationKind::Delete => "To-do deleted.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Local validation failed; nothing was sent.
    Rejected(DraftError),
    /// The user declined the confirmation; nothing was sent.
    Declined,
    Succeeded {
        notice: Notice,
        local_effect: Option<SyncEvent>,
    },
    Failed {
        notice: Notice,
    },
}

impl MutationOutcome {
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            MutationOutcome::Succeeded { notice, .. } | MutationOutcome::Failed { notice } => {
                Some(notice)
            }
            MutationOutcome::Rejected(_) | MutationOutcome::Declined => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Succeeded { .. })
    }
}

/// Maps a failure to the text shown to the user.
pub fn user_message(kind: MutationKind, err: &ClientError) -> String {
    if err.is_not_authenticated() {
        return SESSION_EXPIRED_TEXT.to_string();
    }
    if let Some(first) = err.remote().and_then(|remote| remote.first()) {
        match first.classification() {
            ErrorClassification::Unauthorized => return SESSION_EXPIRED_TEXT.to_string(),
            ErrorClassification::Validation if first.message.contains("dueDate") => {
                return INVALID_DUE_DATE_TEXT.to_string()
            }
            ErrorClassification::Validation | ErrorClassification::Other => {
                return format!("{}: {}", kind.failure_prefix(), first.message)
            }
        }
    }
    format!("{}: {err}", kind.failure_prefix())
}

struct NormalizedDraft {
    title: String,
    description: String,
    priority: shared::domain::Priority,
    due_date: Option<String>,
}

pub struct MutationOrchestrator<Tz: TimeZone = Local> {
    transport: Arc<dyn GraphqlTransport>,
    tz: Tz,
}

impl MutationOrchestrator<Local> {
    pub fn new(transport: Arc<dyn GraphqlTransport>) -> Self {
        Self::with_time_zone(transport, Local)
    }
}

impl<Tz: TimeZone> MutationOrchestrator<Tz> {
    pub fn with_time_zone(transport: Arc<dyn GraphqlTransport>, tz: Tz) -> Self {
        Self { transport, tz }
    }

    pub async fn create(&self, draft: &TodoDraft) -> MutationOutcome {
        let normalized = match self.normalize(draft) {
            Ok(normalized) => normalized,
            Err(err) => return MutationOutcome::Rejected(err),
        };
        let input = CreateTodoInput {
            title: normalized.title,
            description: normalized.description,
            priority: normalized.priority,
            due_date: normalized.due_date,
            completed: false,
        };
        self.run(MutationKind::Create, &CREATE_TODO, &input, None)
            .await
    }

    /// Replaces every editable field; the completion flag is carried over.
    /// A due date whose form text is unchanged keeps its exact stored instant,
    /// since the form shows minutes only.
    pub async fn update(&self, record: &Todo, draft: &TodoDraft) -> MutationOutcome
    where
        Tz::Offset: std::fmt::Display,
    {
        let normalized = match self.normalize(draft) {
            Ok(normalized) => normalized,
            Err(err) => return MutationOutcome::Rejected(err),
        };
        let due_date = match record.due_date {
            Some(existing)
                if draft.due_date_input.trim() == format_local_input(existing, &self.tz) =>
            {
                Some(format_instant(existing))
            }
            _ => normalized.due_date,
        };
        let input = UpdateTodoInput {
            id: record.id.clone(),
            title: Some(normalized.title),
            description: Some(normalized.description),
            priority: Some(normalized.priority),
            due_date: Some(due_date),
            completed: Some(record.completed),
        };
        self.run(MutationKind::Update, &UPDATE_TODO, &input, None)
            .await
    }

    pub async fn toggle_complete(&self, record: &Todo) -> MutationOutcome {
        let input = UpdateTodoInput {
            id: record.id.clone(),
            completed: Some(!record.completed),
            ..UpdateTodoInput::default()
        };
        self.run(MutationKind::Toggle, &UPDATE_TODO, &input, None)
            .await
    }

    pub async fn delete(&self, record: &Todo, confirmation: Confirmation) -> MutationOutcome {
        if confirmation == Confirmation::Declined {
            return MutationOutcome::Declined;
        }
        let input = DeleteTodoInput {
            id: record.id.clone(),
        };
        self.run(
            MutationKind::Delete,
            &DELETE_TODO,
            &input,
            Some(SyncEvent::Deleted(record.id.clone())),
        )
        .await
    }

    fn normalize(&self, draft: &TodoDraft) -> Result<NormalizedDraft, DraftError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        let due_date = parse_local_input(&draft.due_date_input, &self.tz)?.map(format_instant);
        Ok(NormalizedDraft {
            title: title.to_string(),
            description: draft.description.trim().to_string(),
            priority: draft.priority.unwrap_or_default(),
            due_date,
        })
    }

    async fn run<I: Serialize>(
        &self,
        kind: MutationKind,
        operation: &Operation,
        input: &I,
        local_effect: Option<SyncEvent>,
    ) -> MutationOutcome {
        let result = match serde_json::to_value(input) {
            Ok(input) => {
                self.transport
                    .execute(operation, serde_json::json!({ "input": input }))
                    .await
            }
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(_) => {
                info!(operation = operation.name, "mutation succeeded");
                MutationOutcome::Succeeded {
                    notice: Notice::success(kind.success_text()),
                    local_effect,
                }
            }
            Err(err) => {
                warn!(operation = operation.name, "mutation failed: {err}");
                MutationOutcome::Failed {
                    notice: Notice::error(user_message(kind, &err)),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
