use crate::db::sql::SqlError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; intended for internal use and may change without notice.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError with optional origin-specific detail.
    /// Store-origin conflict errors carry a default `StoreError` detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        let message = message.into();

        let detail = match (class, origin) {
            (ErrorClass::Conflict, ErrorOrigin::Store) => {
                Some(ErrorDetail::Store(StoreError::Conflict {
                    message: message.clone(),
                }))
            }
            _ => None,
        };

        Self {
            class,
            origin,
            message,
            detail,
        }
    }

    /// Construct a store-origin internal error.
    pub(crate) fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message.into())
    }

    /// Construct a store-origin unsupported error.
    pub(crate) fn store_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Store, message.into())
    }

    /// Construct a serialize-origin internal error.
    pub(crate) fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, message.into())
    }

    /// Construct an executor-origin invariant violation.
    pub(crate) fn executor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct a primary-key conflict for an insert.
    pub(crate) fn store_conflict(store: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::Conflict,
            ErrorOrigin::Store,
            format!("key already exists in store '{store}': {id}"),
        )
    }

    /// Construct the conflict raised when a store has no numeric id left
    /// to generate.
    pub(crate) fn store_ids_exhausted(store: &str) -> Self {
        Self::new(
            ErrorClass::Conflict,
            ErrorOrigin::Store,
            format!("no free numeric id left in store '{store}'"),
        )
    }

    /// Construct a standardized store-not-opened error.
    pub fn store_not_open(store: impl Into<String>) -> Self {
        let store = store.into();

        Self {
            class: ErrorClass::NotFound,
            origin: ErrorOrigin::Store,
            message: format!("store not initialized: {store}"),
            detail: Some(ErrorDetail::Store(StoreError::NotOpen { store })),
        }
    }

    #[must_use]
    pub const fn is_not_open(&self) -> bool {
        matches!(
            self.detail,
            Some(ErrorDetail::Store(StoreError::NotOpen { .. }))
        )
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),
    #[error("{0}")]
    Sql(SqlError),
}

impl From<SqlError> for InternalError {
    fn from(err: SqlError) -> Self {
        Self {
            class: ErrorClass::Unsupported,
            origin: ErrorOrigin::Sql,
            message: err.to_string(),
            detail: Some(ErrorDetail::Sql(err)),
        }
    }
}

impl From<serde_json::Error> for InternalError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialize_internal(err.to_string())
    }
}

impl From<std::io::Error> for InternalError {
    fn from(err: std::io::Error) -> Self {
        Self::store_internal(err.to_string())
    }
}

///
/// StoreError
///
/// Store-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Store`].
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("store not initialized: {store}")]
    NotOpen { store: String },

    #[error("store conflict: {message}")]
    Conflict { message: String },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    NotFound,
    Internal,
    Conflict,
    Unsupported,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Serialize,
    Store,
    Sql,
    Executor,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Serialize => "serialize",
            Self::Store => "store",
            Self::Sql => "sql",
            Self::Executor => "executor",
        };
        write!(f, "{label}")
    }
}
