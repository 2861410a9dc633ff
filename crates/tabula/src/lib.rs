//! ## Crate layout
//! - `core`: runtime values, records, storage backends, the table builder,
//!   joins, the SQL subset, and observability.
//! - `error`: the public error type callers match on.
//!
//! The `prelude` module mirrors the surface most application code needs.

pub use tabula_core as core;

pub mod error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use tabula_core::{db, obs, record, value};
pub use error::Error;

use tabula_core::db::{Environment, Table, config::StoreConfig};

/// Open a table from a JSON config document, mapping failures to [`Error`].
///
/// Absent config keys take their defaults; unknown keys are rejected.
pub async fn open_json(env: &Environment, config: &str) -> Result<Table, Error> {
    let config = StoreConfig::from_json(config)?;

    Ok(env.open(&config, None).await?)
}

///
/// Prelude
///

pub mod prelude {
    pub use crate::{Error, core::prelude::*};
}
