use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use shared::{
    domain::{Principal, Priority, Todo, TodoId},
    protocol::Operation,
};

use crate::{
    error::ClientError,
    identity::{IdentityError, IdentityProvider, SignUpOutcome, SignUpRequest},
    subscription::{Subscription, SubscriptionFeed},
    transport::GraphqlTransport,
};

pub(crate) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid instant")
}

pub(crate) fn todo(id: &str, title: &str) -> Todo {
    Todo {
        id: TodoId::new(id),
        title: title.to_string(),
        description: None,
        priority: Priority::Medium,
        completed: false,
        due_date: None,
        created_at: at(2025, 7, 1, 9, 0),
        updated_at: None,
        deleted: None,
    }
}

pub(crate) fn principal() -> Principal {
    Principal {
        username: "alice".to_string(),
        user_id: "user-1".to_string(),
        sign_in_details: None,
    }
}

/// In-process transport that records calls and replays scripted replies.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    calls: Mutex<Vec<(&'static str, Value)>>,
    replies: Mutex<VecDeque<Result<Value, ClientError>>>,
    feeds: Mutex<Vec<(&'static str, SubscriptionFeed)>>,
    refuse_subscriptions: bool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn refusing_subscriptions() -> Arc<Self> {
        Arc::new(Self {
            refuse_subscriptions: true,
            ..Self::default()
        })
    }

    pub(crate) fn reply(&self, reply: Result<Value, ClientError>) {
        self.replies.lock().expect("replies").push_back(reply);
    }

    /// Operation names in call order, subscriptions included.
    pub(crate) fn operations(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    pub(crate) fn executed(&self) -> Vec<(&'static str, Value)> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|(_, variables)| !variables.is_null())
            .cloned()
            .collect()
    }

    pub(crate) fn take_feed(&self, operation: &str) -> SubscriptionFeed {
        let mut feeds = self.feeds.lock().expect("feeds");
        let index = feeds
            .iter()
            .position(|(name, _)| *name == operation)
            .expect("feed for operation");
        feeds.remove(index).1
    }
}

#[async_trait]
impl GraphqlTransport for RecordingTransport {
    async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, ClientError> {
        self.calls
            .lock()
            .expect("calls")
            .push((operation.name, variables));
        self.replies
            .lock()
            .expect("replies")
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }

    async fn subscribe(
        &self,
        operation: &Operation,
        _variables: Value,
    ) -> Result<Subscription, ClientError> {
        // Subscriptions are logged with null variables so `executed` can skip them.
        self.calls
            .lock()
            .expect("calls")
            .push((operation.name, Value::Null));
        if self.refuse_subscriptions {
            return Err(ClientError::SubscriptionClosed("refused".to_string()));
        }
        let (feed, subscription) = Subscription::channel(operation);
        self.feeds
            .lock()
            .expect("feeds")
            .push((operation.name, feed));
        Ok(subscription)
    }
}

/// Identity stub holding a fixed token, or none at all.
pub(crate) struct StaticIdentity {
    pub(crate) token: Option<String>,
    pub(crate) fail_sign_out: bool,
}

impl StaticIdentity {
    pub(crate) fn signed_in(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Some(token.to_string()),
            fail_sign_out: false,
        })
    }

    pub(crate) fn signed_out() -> Arc<Self> {
        Arc::new(Self {
            token: None,
            fail_sign_out: false,
        })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_principal(&self) -> Result<Principal, IdentityError> {
        match self.token {
            Some(_) => Ok(principal()),
            None => Err(IdentityError::NotAuthenticated),
        }
    }

    async fn access_token(&self) -> Result<String, IdentityError> {
        self.token.clone().ok_or(IdentityError::NotAuthenticated)
    }

    async fn sign_in(&self, _username: &str, _password: &str) -> Result<Principal, IdentityError> {
        Ok(principal())
    }

    async fn sign_up(&self, _request: SignUpRequest) -> Result<SignUpOutcome, IdentityError> {
        Ok(SignUpOutcome {
            confirmed: false,
            user_id: "user-1".to_string(),
        })
    }

    async fn confirm_sign_up(&self, _username: &str, _code: &str) -> Result<(), IdentityError> {
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.fail_sign_out {
            return Err(IdentityError::Unexpected("GlobalSignOut: HTTP 500".to_string()));
        }
        Ok(())
    }
}
