use std::sync::Arc;

use shared::domain::Principal;
use tracing::{info, warn};

mod appsync;
pub mod config;
pub mod datetime;
pub mod error;
pub mod identity;
pub mod notice;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod subscription;
pub mod transport;
pub mod view;

pub use config::{load_settings, resolve_settings_path, ConfigError, Settings};
pub use error::ClientError;
pub use identity::{HostedIdentityClient, IdentityError, IdentityProvider, SignUpOutcome, SignUpRequest};
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use orchestrator::{Confirmation, DraftError, MutationKind, MutationOrchestrator, MutationOutcome};
pub use session::{SessionEvent, TodoListSession};
pub use store::{SyncEvent, TodoStore};
pub use transport::{GraphqlTransport, HttpGraphqlTransport, RealtimeProtocol};
pub use view::{Filter, TodoStats};

/// Long-lived service object wiring the identity session, the GraphQL
/// facade and the mutation orchestrator. Built once and shared by `Arc`.
pub struct TodoClient {
    identity: Arc<dyn IdentityProvider>,
    transport: Arc<dyn GraphqlTransport>,
    mutations: MutationOrchestrator,
}

impl TodoClient {
    pub fn new(identity: Arc<dyn IdentityProvider>, transport: Arc<dyn GraphqlTransport>) -> Arc<Self> {
        Arc::new(Self {
            mutations: MutationOrchestrator::new(Arc::clone(&transport)),
            identity,
            transport,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Arc<Self>, ClientError> {
        let identity: Arc<dyn IdentityProvider> = Arc::new(HostedIdentityClient::new(
            settings.identity_url()?,
            settings.user_pool_client_id.trim(),
        ));
        let mut transport = HttpGraphqlTransport::new(
            settings.graphql_url()?,
            settings.realtime_url()?,
            Arc::clone(&identity),
        )?;
        if let Some(protocol) = settings.realtime_protocol {
            transport = transport.with_realtime_protocol(protocol);
        }
        info!(
            graphql = %transport.graphql_endpoint(),
            realtime = %transport.realtime_endpoint(),
            protocol = ?transport.realtime_protocol(),
            user_pool = %settings.user_pool_id,
            "todo client configured"
        );
        Ok(Self::new(identity, Arc::new(transport)))
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn transport(&self) -> &Arc<dyn GraphqlTransport> {
        &self.transport
    }

    pub fn mutations(&self) -> &MutationOrchestrator {
        &self.mutations
    }

    /// `Ok(None)` means nobody is signed in, which routes to the sign-in view.
    pub async fn resolve_principal(&self) -> Result<Option<Principal>, IdentityError> {
        match self.identity.current_principal().await {
            Ok(principal) => Ok(Some(principal)),
            Err(IdentityError::NotAuthenticated) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The local session is gone afterwards whatever the remote outcome;
    /// a remote failure only produces an error notice.
    pub async fn sign_out(&self) -> Option<Notice> {
        match self.identity.sign_out().await {
            Ok(()) => None,
            Err(err) => {
                warn!("sign-out failed: {err}");
                Some(Notice::error(format!("Failed to sign out: {err}")))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
