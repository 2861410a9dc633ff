//! Core runtime for Tabula: dynamic values and records, storage backends,
//! the fluent table query builder, joins, the SQL subset, and observability.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod error;
pub mod obs;
pub mod record;
pub mod value;

///
/// CONSTANTS
///

/// Default primary-key field name for a table.
pub const DEFAULT_ID_KEY: &str = "id";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, backends, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            Environment, Table,
            config::{BackendKind, StoreConfig},
            predicate::{Combinator, Operand, Operator},
            query::OrderDirection,
            sql::SqlOutcome,
            table::{JoinKind, JoinOptions, JoinResult},
        },
        record::Record,
        value::Value,
    };
}
