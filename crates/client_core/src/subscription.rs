//! Long-lived subscription channels with an explicit cancellation handle.

use serde_json::Value;
use shared::protocol::Operation;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::debug;

use crate::error::ClientError;

const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug)]
pub enum SubscriptionEvent {
    Data(Value),
    Error(ClientError),
}

/// An open subscription that has not yet been given its handlers.
///
/// The event sequence is lazy, unbounded and cannot be restarted; once it
/// ends (server completion, transport error, cancellation) a new
/// subscription must be opened.
pub struct Subscription {
    operation: &'static str,
    events: mpsc::Receiver<SubscriptionEvent>,
    cancel: oneshot::Sender<()>,
}

impl Subscription {
    /// Builds a subscription backed by an in-process feed. Transports use this
    /// to hand the consumer side out while they keep the feed.
    pub fn channel(operation: &Operation) -> (SubscriptionFeed, Subscription) {
        let (events_tx, events_rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        (
            SubscriptionFeed {
                events: events_tx,
                cancelled: cancel_rx,
            },
            Subscription {
                operation: operation.name,
                events: events_rx,
                cancel: cancel_tx,
            },
        )
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Registers the single data/error handler pair and starts delivery.
    pub fn listen<D, E>(self, mut on_data: D, mut on_error: E) -> SubscriptionHandle
    where
        D: FnMut(Value) + Send + 'static,
        E: FnMut(ClientError) + Send + 'static,
    {
        let Subscription {
            operation,
            mut events,
            cancel,
        } = self;
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SubscriptionEvent::Data(value) => on_data(value),
                    SubscriptionEvent::Error(err) => on_error(err),
                }
            }
            debug!(operation, "subscription stream ended");
        });
        SubscriptionHandle {
            operation,
            cancel: Some(cancel),
            task: Some(task),
        }
    }
}

/// Producer side of a [`Subscription`].
pub struct SubscriptionFeed {
    events: mpsc::Sender<SubscriptionEvent>,
    cancelled: oneshot::Receiver<()>,
}

impl SubscriptionFeed {
    /// Returns `false` once the consumer is gone.
    pub async fn send(&self, event: SubscriptionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    pub async fn send_data(&self, value: Value) -> bool {
        self.send(SubscriptionEvent::Data(value)).await
    }

    pub async fn send_error(&self, err: ClientError) -> bool {
        self.send(SubscriptionEvent::Error(err)).await
    }

    /// Resolves when the consumer cancels or drops its handle.
    pub async fn cancelled(&mut self) {
        let _ = (&mut self.cancelled).await;
    }

    pub fn is_cancelled(&mut self) -> bool {
        !matches!(
            self.cancelled.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        )
    }

    pub fn into_parts(self) -> (mpsc::Sender<SubscriptionEvent>, oneshot::Receiver<()>) {
        (self.events, self.cancelled)
    }
}

/// Cancellation token for a listening subscription. Cancelling consumes the
/// handle; dropping an uncancelled handle cancels it as well.
pub struct SubscriptionHandle {
    operation: &'static str,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
            debug!(operation = self.operation, "subscription cancelled");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}
