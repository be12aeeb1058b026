pub mod clock;
pub mod document;
pub mod error;
pub mod events;
pub mod models;
pub mod projection;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use document::{
    Comparison, Direction, Document, FieldValue, Fields, Filter, OrderBy, PREFIX_SENTINEL, Query,
};
pub use error::{AuthError, DecodeError, PactError, Result, StoreError};
pub use events::{ContractEvent, ContractEventKind};
pub use models::{
    CONTRACTS_COLLECTION, Contract, ContractStatus, FRIENDS_COLLECTION, FriendEdge, NewContract,
    USERS_COLLECTION, User,
};
pub use projection::{Projection, RefreshTicket, Snapshot};
pub use storage::{ContractEventSink, DocumentStore, IdentityService};
