use std::sync::Arc;

use pact_core::models::field;
use pact_core::{
    Clock, Direction, Document, DocumentStore, FRIENDS_COLLECTION, FriendEdge, Filter,
    PREFIX_SENTINEL, PactError, Projection, Query, Result, Snapshot, SystemClock,
    USERS_COLLECTION, User,
};
use pact_identity::IdentityContext;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::grouping::{PartnerChoices, partition_users};

pub const USERS_PAGE_SIZE: usize = 50;
pub const SEARCH_PAGE_SIZE: usize = 10;

/// User listing and the actor's friend edges, both as fenced projections
/// replaced wholesale by every load.
pub struct UserDirectory {
    identity: Arc<IdentityContext>,
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    users: Projection<User>,
    friends: Projection<FriendEdge>,
}

impl UserDirectory {
    pub fn new(identity: Arc<IdentityContext>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            identity,
            documents,
            clock: Arc::new(SystemClock),
            users: Projection::new("users"),
            friends: Projection::new("friends"),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// First page of users ordered by name.
    pub async fn fetch_users(&self) -> Result<Arc<Vec<User>>> {
        let query = Query::collection(USERS_COLLECTION)
            .order_by(field::NAME, Direction::Ascending)
            .limit(USERS_PAGE_SIZE);
        self.replace_users(query).await
    }

    /// Users whose name starts with `prefix` (case-sensitive range match),
    /// at most [`SEARCH_PAGE_SIZE`]. A blank prefix lists users like
    /// [`fetch_users`](Self::fetch_users).
    pub async fn search_users(&self, prefix: &str) -> Result<Arc<Vec<User>>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return self.fetch_users().await;
        }

        let query = Query::collection(USERS_COLLECTION)
            .filter(Filter::ge(field::NAME, prefix))
            .filter(Filter::lt(field::NAME, format!("{prefix}{PREFIX_SENTINEL}")))
            .order_by(field::NAME, Direction::Ascending)
            .limit(SEARCH_PAGE_SIZE);
        self.replace_users(query).await
    }

    pub async fn load_friends(&self) -> Result<Arc<Vec<FriendEdge>>> {
        let actor_id = self.identity.require_actor()?;
        let ticket = self.friends.begin();

        let query = Query::collection(FRIENDS_COLLECTION)
            .filter(Filter::eq(field::USER_ID, actor_id.as_str()))
            .order_by(field::DATE_ADDED, Direction::Ascending);
        let documents = self.documents.query(&query).await?;
        let edges = decode_all(&documents, FriendEdge::from_document);

        if self.friends.commit(ticket, Some(actor_id.clone()), edges) {
            info!(actor_id = %actor_id, version = ticket.sequence(), "friends refreshed");
        }
        Ok(self.friends.current().items)
    }

    /// Adds `friend_id` to the actor's friends. Adding an existing friend
    /// returns the edge already on record.
    pub async fn add_friend(&self, friend_id: &str) -> Result<FriendEdge> {
        let actor_id = self.identity.require_actor()?;
        let friend_id = friend_id.trim();
        if friend_id.is_empty() {
            return Err(PactError::validation("friend_id", "friend is required"));
        }
        if friend_id == actor_id {
            return Err(PactError::validation(
                "friend_id",
                "a user cannot befriend themselves",
            ));
        }

        if self.documents.get(USERS_COLLECTION, friend_id).await?.is_none() {
            return Err(PactError::NotFound {
                collection: USERS_COLLECTION.to_string(),
                id: friend_id.to_string(),
            });
        }

        if let Some(existing) = self.edges_to(&actor_id, friend_id).await?.into_iter().next() {
            return Ok(existing);
        }

        let date_added = self.clock.now();
        let fields = FriendEdge::edge_fields(&actor_id, friend_id, date_added);
        let id = self.documents.add(FRIENDS_COLLECTION, fields).await?;
        info!(actor_id = %actor_id, friend_id, "friend added");

        self.refresh_friends().await;
        Ok(FriendEdge {
            id,
            user_id: actor_id,
            friend_id: friend_id.to_string(),
            date_added,
        })
    }

    /// Deletes the actor's edge to `friend_id`. The reverse edge, if any, is
    /// left alone.
    pub async fn remove_friend(&self, friend_id: &str) -> Result<()> {
        let actor_id = self.identity.require_actor()?;
        let edges = self.edges_to(&actor_id, friend_id).await?;
        if edges.is_empty() {
            return Err(PactError::NotFound {
                collection: FRIENDS_COLLECTION.to_string(),
                id: friend_id.to_string(),
            });
        }

        for edge in &edges {
            self.documents.delete(FRIENDS_COLLECTION, &edge.id).await?;
        }
        info!(actor_id = %actor_id, friend_id, "friend removed");

        self.refresh_friends().await;
        Ok(())
    }

    pub fn users(&self) -> Snapshot<User> {
        self.users.current()
    }

    pub fn friends(&self) -> Snapshot<FriendEdge> {
        self.friends.current()
    }

    pub fn subscribe_users(&self) -> watch::Receiver<Snapshot<User>> {
        self.users.subscribe()
    }

    pub fn subscribe_friends(&self) -> watch::Receiver<Snapshot<FriendEdge>> {
        self.friends.subscribe()
    }

    /// The loaded users split into friends and others for partner selection.
    pub fn partner_choices(&self) -> PartnerChoices {
        let Some(actor_id) = self.identity.current_actor_id() else {
            return PartnerChoices::default();
        };
        partition_users(&self.users.current().items, &self.friends.current().items, &actor_id)
    }

    async fn replace_users(&self, query: Query) -> Result<Arc<Vec<User>>> {
        let ticket = self.users.begin();
        let documents = self.documents.query(&query).await.map_err(|err| {
            warn!("failed to load users: {err}");
            PactError::from(err)
        })?;
        let users = decode_all(&documents, User::from_document);
        let count = users.len();

        if self
            .users
            .commit(ticket, self.identity.current_actor_id(), users)
        {
            info!(count, version = ticket.sequence(), "users refreshed");
        }
        Ok(self.users.current().items)
    }

    async fn edges_to(&self, actor_id: &str, friend_id: &str) -> Result<Vec<FriendEdge>> {
        let query = Query::collection(FRIENDS_COLLECTION)
            .filter(Filter::eq(field::USER_ID, actor_id))
            .filter(Filter::eq(field::FRIEND_ID, friend_id));
        let documents = self.documents.query(&query).await?;
        Ok(decode_all(&documents, FriendEdge::from_document))
    }

    async fn refresh_friends(&self) {
        if let Err(err) = self.load_friends().await {
            warn!("refresh after friend change failed: {err}");
        }
    }
}

fn decode_all<T, E: std::fmt::Display>(
    documents: &[Document],
    decode: impl Fn(&Document) -> std::result::Result<T, E>,
) -> Vec<T> {
    documents
        .iter()
        .filter_map(|document| match decode(document) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!("skipping malformed document: {err}");
                None
            }
        })
        .collect()
}
