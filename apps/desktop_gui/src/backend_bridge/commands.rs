//! Backend commands queued from UI to backend worker.

use shared::domain::{TodoDraft, TodoId};

pub enum BackendCommand {
    SignIn {
        username: String,
        password: String,
    },
    SignUp {
        username: String,
        email: String,
        password: String,
    },
    ConfirmSignUp {
        username: String,
        code: String,
    },
    SignOut,
    Reload,
    CreateTodo {
        draft: TodoDraft,
    },
    UpdateTodo {
        id: TodoId,
        draft: TodoDraft,
    },
    ToggleComplete {
        id: TodoId,
    },
    /// Sent only after the user confirmed the deletion dialog.
    DeleteTodo {
        id: TodoId,
    },
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::SignIn { .. } => "sign_in",
            BackendCommand::SignUp { .. } => "sign_up",
            BackendCommand::ConfirmSignUp { .. } => "confirm_sign_up",
            BackendCommand::SignOut => "sign_out",
            BackendCommand::Reload => "reload",
            BackendCommand::CreateTodo { .. } => "create_todo",
            BackendCommand::UpdateTodo { .. } => "update_todo",
            BackendCommand::ToggleComplete { .. } => "toggle_complete",
            BackendCommand::DeleteTodo { .. } => "delete_todo",
        }
    }
}
