use thiserror::Error;

/// Failures reported by a document store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// A conditional update found the document in an unexpected state.
    #[error("precondition failed for document {collection}/{id}")]
    PreconditionFailed { collection: String, id: String },
}

/// Rejections from the external identity service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("email address is malformed")]
    InvalidEmail,

    #[error("password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },

    #[error("email address is already registered")]
    EmailInUse,

    #[error("email or password is incorrect")]
    InvalidCredentials,

    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// A stored document that does not have the shape its collection requires.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("document {id} is missing field {field}")]
    MissingField { id: String, field: &'static str },

    #[error("document {id} field {field}: expected {expected}, found {actual}")]
    WrongType {
        id: String,
        field: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("document {id} field {field} has invalid value {value:?}")]
    InvalidValue {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("document {id} is inconsistent: {reason}")]
    Inconsistent { id: String, reason: &'static str },
}

#[derive(Debug, Error)]
pub enum PactError {
    #[error("no authenticated session")]
    Unauthenticated,

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("contract {contract_id}: {reason}")]
    State { contract_id: String, reason: String },

    #[error("actor {actor_id} may not judge contract {contract_id}")]
    Unauthorized {
        contract_id: String,
        actor_id: String,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl PactError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        PactError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for PactError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => PactError::StoreUnavailable(reason),
            StoreError::NotFound { collection, id } => PactError::NotFound { collection, id },
            StoreError::PreconditionFailed { id, .. } => PactError::State {
                contract_id: id,
                reason: "document changed concurrently".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PactError>;
