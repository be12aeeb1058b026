//! Who is acting: session state on top of an external identity service.

use std::sync::Arc;

use pact_core::{
    Clock, DocumentStore, IdentityService, PactError, Result, SystemClock, USERS_COLLECTION, User,
};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub actor_id: String,
    /// `Users/{actor_id}` as fetched when the session opened. `None` when the
    /// profile could not be read.
    pub profile: Option<User>,
}

/// Resolves the current actor and pushes every session change to
/// subscribers.
pub struct IdentityContext {
    service: Arc<dyn IdentityService>,
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    session: watch::Sender<Option<Session>>,
}

impl IdentityContext {
    pub fn new(service: Arc<dyn IdentityService>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            service,
            documents,
            clock: Arc::new(SystemClock),
            session: watch::Sender::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn current_actor_id(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|session| session.actor_id.clone())
    }

    pub fn current_user(&self) -> Option<User> {
        self.session
            .borrow()
            .as_ref()
            .and_then(|session| session.profile.clone())
    }

    /// The current actor, or `Unauthenticated` when nobody is signed in.
    pub fn require_actor(&self) -> Result<String> {
        self.current_actor_id().ok_or(PactError::Unauthenticated)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let actor_id = self.service.sign_in(email, password).await?;
        let profile = self.fetch_profile(&actor_id).await;

        let session = Session { actor_id, profile };
        self.session.send_replace(Some(session.clone()));
        info!(actor_id = %session.actor_id, "signed in");
        Ok(session)
    }

    /// Creates the account and its `Users` profile, then opens a session.
    /// If the profile write fails the account exists but no session is
    /// opened.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PactError::validation("name", "name is required"));
        }

        let actor_id = self.service.sign_up(email, password).await?;
        let email = email.trim().to_ascii_lowercase();
        let fields = User::profile_fields(&email, name, self.clock.now());
        self.documents
            .set(USERS_COLLECTION, &actor_id, fields)
            .await?;

        let user = User {
            id: actor_id.clone(),
            email,
            name: name.to_string(),
        };
        self.session.send_replace(Some(Session {
            actor_id,
            profile: Some(user.clone()),
        }));
        info!(actor_id = %user.id, "registered");
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.service.sign_out().await?;
        if let Some(previous) = self.session.send_replace(None) {
            info!(actor_id = %previous.actor_id, "signed out");
        }
        Ok(())
    }

    async fn fetch_profile(&self, actor_id: &str) -> Option<User> {
        match self.documents.get(USERS_COLLECTION, actor_id).await {
            Ok(Some(document)) => match User::from_document(&document) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(actor_id, "malformed user profile: {err}");
                    None
                }
            },
            Ok(None) => {
                warn!(actor_id, "no user profile on record");
                None
            }
            Err(err) => {
                warn!(actor_id, "failed to fetch user profile: {err}");
                None
            }
        }
    }
}
