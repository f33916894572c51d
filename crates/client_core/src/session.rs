//! Lifecycle of one signed-in list view: initial fetch, the three change
//! subscriptions and the store they converge.

use serde_json::{json, Value};
use shared::{
    domain::{Principal, Todo},
    protocol::{DeletedTodo, Operation, TodoConnection, LIST_TODOS, ON_CREATE_TODO, ON_DELETE_TODO, ON_UPDATE_TODO},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    notice::Notice,
    store::{SyncEvent, TodoStore},
    subscription::SubscriptionHandle,
    transport::GraphqlTransport,
};

pub const LIST_PAGE_SIZE: u32 = 100;

/// A change event tagged with the session generation that produced it.
/// Events from a torn-down generation are discarded by [`TodoListSession::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: SyncEvent,
}

/// Handles of the live change subscriptions.
#[derive(Default)]
pub struct LiveUpdates {
    handles: Vec<SubscriptionHandle>,
}

impl LiveUpdates {
    pub async fn open(
        transport: &dyn GraphqlTransport,
        generation: u64,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let mut handles = Vec::with_capacity(3);
        for operation in [ON_CREATE_TODO, ON_UPDATE_TODO, ON_DELETE_TODO] {
            match transport.subscribe(&operation, json!({})).await {
                Ok(subscription) => {
                    let sender = events.clone();
                    let handle = subscription.listen(
                        move |value| forward_change(&operation, value, generation, &sender),
                        move |err| {
                            warn!(operation = operation.name, "subscription error: {err}");
                        },
                    );
                    handles.push(handle);
                }
                Err(err) => {
                    warn!(operation = operation.name, "failed to open subscription: {err}");
                }
            }
        }
        info!(generation, open = handles.len(), "live updates started");
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn cancel(self) {
        for handle in self.handles {
            handle.cancel();
        }
    }
}

fn forward_change(
    operation: &Operation,
    value: Value,
    generation: u64,
    sender: &mpsc::UnboundedSender<SessionEvent>,
) {
    let event = if operation.name == ON_DELETE_TODO.name {
        serde_json::from_value::<DeletedTodo>(value).map(|deleted| SyncEvent::Deleted(deleted.id))
    } else if operation.name == ON_UPDATE_TODO.name {
        serde_json::from_value::<Todo>(value).map(SyncEvent::Updated)
    } else {
        serde_json::from_value::<Todo>(value).map(SyncEvent::Created)
    };

    match event {
        Ok(event) => {
            let _ = sender.send(SessionEvent { generation, event });
        }
        Err(err) => warn!(operation = operation.name, "dropping undecodable change event: {err}"),
    }
}

/// Reads every page of the list query, following `nextToken`.
pub async fn fetch_all_todos(transport: &dyn GraphqlTransport) -> Result<Vec<Todo>, ClientError> {
    let mut records = Vec::new();
    let mut next_token: Option<String> = None;
    loop {
        let value = transport
            .execute(
                &LIST_TODOS,
                json!({ "limit": LIST_PAGE_SIZE, "nextToken": next_token }),
            )
            .await?;
        let page: TodoConnection = serde_json::from_value(value)?;
        debug!(items = page.items.len(), more = page.next_token.is_some(), "fetched todo page");
        records.extend(page.items);
        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }
    Ok(records)
}

pub struct TodoListSession {
    store: TodoStore,
    loading: bool,
    generation: u64,
    principal: Option<Principal>,
    live: Option<LiveUpdates>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl TodoListSession {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                store: TodoStore::new(),
                loading: false,
                generation: 0,
                principal: None,
                live: None,
                events,
            },
            receiver,
        )
    }

    /// Opens the change subscriptions, then loads the full list. Returns an
    /// error notice when the initial read fails; the loading flag is cleared
    /// on every path.
    pub async fn initialize(
        &mut self,
        transport: &dyn GraphqlTransport,
        principal: Principal,
    ) -> Option<Notice> {
        self.teardown();
        self.generation += 1;
        self.loading = true;
        info!(generation = self.generation, username = %principal.username, "initializing todo list");
        self.principal = Some(principal);

        self.live = Some(LiveUpdates::open(transport, self.generation, &self.events).await);

        let notice = match fetch_all_todos(transport).await {
            Ok(records) => {
                self.store.seed(records);
                info!(count = self.store.len(), "todo list loaded");
                None
            }
            Err(err) => {
                warn!("initial todo fetch failed: {err}");
                self.store.clear();
                Some(Notice::error(format!("Failed to load to-dos: {err}")))
            }
        };
        self.loading = false;
        notice
    }

    /// Applies a change event from the current generation; returns whether
    /// it was applied.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        if event.generation != self.generation {
            debug!(
                stale = event.generation,
                current = self.generation,
                "ignoring change event from previous session"
            );
            return false;
        }
        self.store.apply(event.event);
        true
    }

    /// Applies the local effect of a completed mutation.
    pub fn apply_local(&mut self, event: SyncEvent) {
        self.store.apply(event);
    }

    /// Cancels the live subscriptions. Calling it again is a no-op.
    pub fn teardown(&mut self) {
        if let Some(live) = self.live.take() {
            live.cancel();
            debug!(generation = self.generation, "live updates cancelled");
        }
    }

    /// Tears down and forgets the signed-in list.
    pub fn reset(&mut self) {
        self.teardown();
        self.generation += 1;
        self.store.clear();
        self.principal = None;
        self.loading = false;
    }

    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.as_ref().map_or(0, LiveUpdates::len)
    }
}

impl Drop for TodoListSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
