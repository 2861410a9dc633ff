//! Pure aggregate helpers over an already-filtered row set.

use crate::{
    record::Record,
    value::{Value, ValueKey, strict_order_cmp},
};
use std::{cmp::Ordering, collections::HashSet};

#[must_use]
pub(crate) fn pluck(rows: &[Record], field: &str) -> Vec<Value> {
    rows.iter().map(|row| row.field(field).clone()).collect()
}

/// Unique values in first-seen order.
#[must_use]
pub(crate) fn distinct(rows: &[Record], field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for row in rows {
        let value = row.field(field);
        if seen.insert(ValueKey::new(value.clone())) {
            out.push(value.clone());
        }
    }

    out
}

#[must_use]
pub(crate) fn sum(rows: &[Record], field: &str) -> f64 {
    rows.iter().map(|row| row.field(field).coerce_f64()).sum()
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub(crate) fn avg(rows: &[Record], field: &str) -> f64 {
    if rows.is_empty() {
        0.0
    } else {
        sum(rows, field) / rows.len() as f64
    }
}

/// Running extreme; nulls and values not comparable with the current
/// extreme are skipped.
#[must_use]
pub(crate) fn extreme(rows: &[Record], field: &str, keep: Ordering) -> Option<Value> {
    let mut best: Option<&Value> = None;

    for row in rows {
        let value = row.field(field);
        if value.is_null() {
            continue;
        }

        best = match best {
            None => Some(value),
            Some(current) if strict_order_cmp(value, current) == Some(keep) => Some(value),
            keep_current => keep_current,
        };
    }

    best.cloned()
}
