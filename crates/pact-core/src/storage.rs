use async_trait::async_trait;

use crate::document::{Document, Fields, Filter, Query};
use crate::error::{AuthError, StoreError};
use crate::events::ContractEvent;

/// Collection-oriented document database keyed by opaque string ids.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Inserts a new document and returns the id the store assigned to it.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Creates or replaces the document at `id`.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Merges `fields` into an existing document. With a precondition, the
    /// write only happens if the current document matches it; otherwise
    /// `StoreError::PreconditionFailed` is returned and nothing is written.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        precondition: Option<&Filter>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// External authentication provider. Returns stable user ids.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[async_trait]
pub trait ContractEventSink: Send + Sync {
    async fn publish(&self, event: &ContractEvent) -> anyhow::Result<()>;
}
