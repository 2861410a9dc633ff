//! Module: db::store
//! Responsibility: the uniform record-store contract and its two reference
//! backends.
//! Does not own: filtering, sorting, or any query semantics.
//! Boundary: every backend returns full defensive copies; nothing is cached
//! above this layer.

mod flat;
mod indexed;
mod text;

#[cfg(test)]
mod tests;

use crate::{error::InternalError, record::Record, value::Value};
use async_trait::async_trait;

// re-exports
pub use flat::FlatBackend;
pub use indexed::{IndexedBackend, IndexedRegistry};
pub use text::{FileTextStore, MemoryTextStore, TextStore};

///
/// UpgradeHook
///
/// Invoked with `(old_version, new_version)` when a versioned backend opens
/// at a version above the stored one.
///

pub type UpgradeHook = dyn Fn(u32, u32) + Send + Sync;

///
/// StorageBackend
///
/// Async record-store contract shared by every backend.
///

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Qualified `db:store` name used in diagnostics and metrics.
    fn name(&self) -> &str;

    /// Field that carries each record's id.
    fn id_key(&self) -> &str;

    /// Ensure the backing table exists. Safe to call more than once.
    async fn init(&self, upgrade: Option<&UpgradeHook>) -> Result<(), InternalError>;

    /// Persist a record, assigning an id when it has none, and return the id.
    async fn insert(&self, record: Record) -> Result<Value, InternalError>;

    /// Write `record` under `id`. Returns `false` when no such id exists.
    async fn update(&self, id: &Value, record: Record) -> Result<bool, InternalError>;

    /// Remove the record under `id`. Absent ids succeed.
    async fn delete(&self, id: &Value) -> Result<bool, InternalError>;

    async fn fetch_all(&self) -> Result<Vec<Record>, InternalError>;

    async fn clear(&self) -> Result<bool, InternalError>;
}

/// Integral view of an id for key generation: integers, finite floats
/// (floored) and text holding an integer. Anything else has no position
/// in the id sequence.
pub(crate) fn integral_id(id: &Value) -> Option<i64> {
    // 2^63; every float strictly below it fits in an i64 once floored
    const BOUND: f64 = 9_223_372_036_854_775_808.0;

    match id {
        Value::Int(n) => Some(*n),
        Value::Float(f) if f.is_finite() && (-BOUND..BOUND).contains(&f.floor()) => {
            #[allow(clippy::cast_possible_truncation)]
            Some(f.floor() as i64)
        }
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Next id for a table: one past the largest integral id, starting at 1.
///
/// `None` once the largest id is `i64::MAX`.
pub(crate) fn next_numeric_id<'a>(ids: impl Iterator<Item = &'a Value>) -> Option<i64> {
    ids.filter_map(integral_id).fold(0, i64::max).checked_add(1)
}
