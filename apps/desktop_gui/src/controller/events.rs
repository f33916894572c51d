//! UI/backend events and error modeling for desktop GUI controller.

use client_core::{IdentityError, MutationKind, Notice};
use shared::domain::{Principal, Todo};

pub enum UiEvent {
    Info(String),
    /// No stored session; show the sign-in view.
    SignedOut,
    SignedIn(Principal),
    SignUpComplete {
        username: String,
        confirmed: bool,
    },
    SignUpConfirmed {
        username: String,
    },
    ListLoading,
    Snapshot(Vec<Todo>),
    Notice(Notice),
    MutationFinished {
        kind: MutationKind,
        succeeded: bool,
        notice: Option<Notice>,
    },
    /// Local validation failed; the form keeps its contents.
    DraftRejected(String),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    SignIn,
    SignUp,
    ConfirmSignUp,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("401")
            || message_lower.contains("403")
            || message_lower.contains("unauthorized")
            || message_lower.contains("not authorized")
            || message_lower.contains("session has expired")
            || message_lower.contains("incorrect username or password")
        {
            UiErrorCategory::Auth
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("required")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("timeout")
            || message_lower.contains("timed out")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("unavailable")
            || message_lower.contains("disconnect")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Maps user-directory failures by their service error kind.
    pub fn from_identity(context: UiErrorContext, err: &IdentityError) -> Self {
        let category = match err {
            IdentityError::NotAuthenticated => UiErrorCategory::Auth,
            IdentityError::Http(_) => UiErrorCategory::Transport,
            IdentityError::Rejected { kind, .. } => match kind.as_str() {
                "NotAuthorizedException" | "UserNotFoundException" | "UserNotConfirmedException"
                | "ChallengeRequired" => UiErrorCategory::Auth,
                "InvalidParameterException"
                | "InvalidPasswordException"
                | "UsernameExistsException"
                | "CodeMismatchException"
                | "ExpiredCodeException" => UiErrorCategory::Validation,
                _ => UiErrorCategory::Unknown,
            },
            IdentityError::Unexpected(_) => UiErrorCategory::Unknown,
        };
        let message = match err {
            IdentityError::Rejected { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        };
        Self {
            category,
            context,
            message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == UiErrorCategory::Auth && self.context == UiErrorContext::General
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
