pub mod documents;
pub mod events;
pub mod identity;

pub use documents::InMemoryDocumentStore;
pub use events::InMemoryEventSink;
pub use identity::{InMemoryIdentityService, MIN_PASSWORD_LEN};
