//! Backend worker: owns the list session and runs every remote call on its
//! own tokio runtime so the UI thread never blocks.

use std::{sync::Arc, thread};

use client_core::{
    Confirmation, MutationKind, MutationOutcome, Notice, SessionEvent, SignUpRequest, TodoClient,
    TodoListSession,
};
use crossbeam_channel::{Receiver, Sender};
use shared::domain::{Principal, Todo, TodoId};
use tokio::sync::mpsc;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

const COMMAND_RELAY_CAPACITY: usize = 64;
/// Create, update and delete feeds.
const LIVE_SUBSCRIPTION_COUNT: usize = 3;

pub(super) fn spawn_backend_thread(
    client: Arc<TodoClient>,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(run(client, cmd_rx, ui_tx));
    });
}

async fn run(client: Arc<TodoClient>, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    // The UI queue is a crossbeam channel; relay it so commands can be
    // awaited next to the session's change events.
    let (relay_tx, mut commands) = mpsc::channel(COMMAND_RELAY_CAPACITY);
    tokio::task::spawn_blocking(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            if relay_tx.blocking_send(cmd).is_err() {
                break;
            }
        }
    });

    let (session, mut session_events) = TodoListSession::new();
    let mut worker = Worker {
        client,
        session,
        ui_tx,
    };
    worker.restore_session().await;

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(cmd) => worker.handle(cmd).await,
                None => break,
            },
            Some(event) = session_events.recv() => worker.on_session_event(event),
        }
    }

    worker.session.teardown();
    tracing::info!("backend worker stopped");
}

struct Worker {
    client: Arc<TodoClient>,
    session: TodoListSession,
    ui_tx: Sender<UiEvent>,
}

impl Worker {
    fn emit(&self, event: UiEvent) {
        if let Err(err) = self.ui_tx.try_send(event) {
            tracing::warn!("dropping ui event: {err}");
        }
    }

    fn publish_snapshot(&self) {
        self.emit(UiEvent::Snapshot(self.session.store().records().to_vec()));
    }

    async fn restore_session(&mut self) {
        match self.client.resolve_principal().await {
            Ok(Some(principal)) => {
                self.emit(UiEvent::SignedIn(principal.clone()));
                self.load_list(principal).await;
            }
            Ok(None) => self.emit(UiEvent::SignedOut),
            Err(err) => {
                self.emit(UiEvent::Error(UiError::from_identity(UiErrorContext::General, &err)));
                self.emit(UiEvent::SignedOut);
            }
        }
    }

    async fn load_list(&mut self, principal: Principal) {
        self.emit(UiEvent::ListLoading);
        let notice = self
            .session
            .initialize(self.client.transport().as_ref(), principal)
            .await;
        self.publish_snapshot();
        match notice {
            Some(notice) => self.emit(UiEvent::Notice(notice)),
            None if self.session.live_subscriptions() < LIVE_SUBSCRIPTION_COUNT => {
                self.emit(UiEvent::Info(
                    "Live updates are unavailable; use Reload to refresh.".to_string(),
                ));
            }
            None => {}
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        if self.session.apply(event) {
            self.publish_snapshot();
        }
    }

    async fn handle(&mut self, cmd: BackendCommand) {
        tracing::debug!(command = cmd.name(), "handling backend command");
        match cmd {
            BackendCommand::SignIn { username, password } => {
                match self.client.identity().sign_in(&username, &password).await {
                    Ok(principal) => {
                        self.emit(UiEvent::SignedIn(principal.clone()));
                        self.load_list(principal).await;
                    }
                    Err(err) => self.emit(UiEvent::Error(UiError::from_identity(
                        UiErrorContext::SignIn,
                        &err,
                    ))),
                }
            }
            BackendCommand::SignUp {
                username,
                email,
                password,
            } => {
                let request = SignUpRequest {
                    username: username.clone(),
                    email,
                    password,
                };
                match self.client.identity().sign_up(request).await {
                    Ok(outcome) => self.emit(UiEvent::SignUpComplete {
                        username,
                        confirmed: outcome.confirmed,
                    }),
                    Err(err) => self.emit(UiEvent::Error(UiError::from_identity(
                        UiErrorContext::SignUp,
                        &err,
                    ))),
                }
            }
            BackendCommand::ConfirmSignUp { username, code } => {
                match self.client.identity().confirm_sign_up(&username, &code).await {
                    Ok(()) => self.emit(UiEvent::SignUpConfirmed { username }),
                    Err(err) => self.emit(UiEvent::Error(UiError::from_identity(
                        UiErrorContext::ConfirmSignUp,
                        &err,
                    ))),
                }
            }
            BackendCommand::SignOut => {
                self.session.reset();
                let notice = self.client.sign_out().await;
                self.emit(UiEvent::SignedOut);
                if let Some(notice) = notice {
                    self.emit(UiEvent::Notice(notice));
                }
            }
            BackendCommand::Reload => match self.session.principal().cloned() {
                Some(principal) => self.load_list(principal).await,
                None => self.emit(UiEvent::SignedOut),
            },
            BackendCommand::CreateTodo { draft } => {
                let outcome = self.client.mutations().create(&draft).await;
                self.finish(MutationKind::Create, outcome);
            }
            BackendCommand::UpdateTodo { id, draft } => {
                let Some(record) = self.known_record(MutationKind::Update, &id) else {
                    return;
                };
                let outcome = self.client.mutations().update(&record, &draft).await;
                self.finish(MutationKind::Update, outcome);
            }
            BackendCommand::ToggleComplete { id } => {
                let Some(record) = self.known_record(MutationKind::Toggle, &id) else {
                    return;
                };
                let outcome = self.client.mutations().toggle_complete(&record).await;
                self.finish(MutationKind::Toggle, outcome);
            }
            BackendCommand::DeleteTodo { id } => {
                let Some(record) = self.known_record(MutationKind::Delete, &id) else {
                    return;
                };
                let outcome = self
                    .client
                    .mutations()
                    .delete(&record, Confirmation::Confirmed)
                    .await;
                self.finish(MutationKind::Delete, outcome);
            }
        }
    }

    fn known_record(&self, kind: MutationKind, id: &TodoId) -> Option<Todo> {
        let record = self.session.store().get(id).cloned();
        if record.is_none() {
            tracing::warn!(%id, ?kind, "mutation targets a record that is no longer listed");
            self.emit(UiEvent::MutationFinished {
                kind,
                succeeded: false,
                notice: Some(Notice::error("That to-do no longer exists.")),
            });
        }
        record
    }

    fn finish(&mut self, kind: MutationKind, outcome: MutationOutcome) {
        match outcome {
            MutationOutcome::Rejected(err) => self.emit(UiEvent::DraftRejected(err.to_string())),
            MutationOutcome::Declined => self.emit(UiEvent::MutationFinished {
                kind,
                succeeded: false,
                notice: None,
            }),
            MutationOutcome::Succeeded {
                notice,
                local_effect,
            } => {
                if let Some(effect) = local_effect {
                    self.session.apply_local(effect);
                    self.publish_snapshot();
                }
                self.emit(UiEvent::MutationFinished {
                    kind,
                    succeeded: true,
                    notice: Some(notice),
                });
            }
            MutationOutcome::Failed { notice } => self.emit(UiEvent::MutationFinished {
                kind,
                succeeded: false,
                notice: Some(notice),
            }),
        }
    }
}
