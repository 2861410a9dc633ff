use derive_more::Display;
use serde::{Deserialize, Serialize};
use tabula_core::error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = match (err.class, err.origin) {
            (ErrorClass::Unsupported, CoreErrorOrigin::Sql) => {
                ErrorKind::Query(QueryErrorKind::Unsupported)
            }
            (ErrorClass::Conflict, _) => ErrorKind::Update(UpdateErrorKind::Conflict),
            (ErrorClass::NotFound, CoreErrorOrigin::Store) => {
                ErrorKind::Store(StoreErrorKind::NotOpen)
            }
            (ErrorClass::Unsupported, CoreErrorOrigin::Store) => {
                ErrorKind::Store(StoreErrorKind::Rejected)
            }
            (ErrorClass::Internal, CoreErrorOrigin::Serialize) => ErrorKind::InvalidPayload,
            _ => ErrorKind::Internal,
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    Query(QueryErrorKind),
    Update(UpdateErrorKind),
    Store(StoreErrorKind),

    /// Input text could not be decoded (config or import JSON).
    InvalidPayload,

    /// The caller cannot remediate this.
    Internal,
}

///
/// QueryErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum QueryErrorKind {
    /// Statement uses syntax outside the supported subset.
    Unsupported,
}

///
/// UpdateErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum UpdateErrorKind {
    /// A record with the same id already exists.
    Conflict,
}

///
/// StoreErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StoreErrorKind {
    /// The backing table was used before `init`.
    NotOpen,

    /// The store refused the request (invalid key, version downgrade).
    Rejected,
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Executor,
    Serialize,
    Sql,
    Store,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Executor => Self::Executor,
            CoreErrorOrigin::Serialize => Self::Serialize,
            CoreErrorOrigin::Sql => Self::Sql,
            CoreErrorOrigin::Store => Self::Store,
        }
    }
}
