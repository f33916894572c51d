use shared::error::RemoteError;
use thiserror::Error;

use crate::{config::ConfigError, identity::IdentityError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket failure: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("subscription closed: {0}")]
    SubscriptionClosed(String),
}

impl ClientError {
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ClientError::Remote(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, ClientError::Identity(IdentityError::NotAuthenticated))
    }
}
