use crate::value::{Value, canonical_cmp};
use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};

///
/// ValueKey
///
/// Hashable, totally ordered wrapper around a [`Value`].
///
/// Equality and ordering follow `canonical_cmp`, so `Int(1)` and
/// `Float(1.0)` are the same key and every NaN is one key. Used for record
/// primary keys, join indexes and `distinct`.
///

#[derive(Clone, Debug)]
pub struct ValueKey(Value);

impl ValueKey {
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ValueKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        canonical_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for ValueKey {}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_cmp(&self.0, &other.0)
    }
}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

const I64_BOUND_F64: f64 = 9_223_372_036_854_775_808.0;

// Must agree with canonical equality: integral floats hash as integers.
#[allow(clippy::cast_possible_truncation)]
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Int(i) => {
            state.write_u8(2);
            i.hash(state);
        }
        Value::Float(f) => {
            state.write_u8(2);
            if f.is_nan() {
                state.write_u64(u64::MAX);
            } else if f.fract() == 0.0 && (-I64_BOUND_F64..I64_BOUND_F64).contains(f) {
                (*f as i64).hash(state);
            } else {
                f.to_bits().hash(state);
            }
        }
        Value::Text(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Value::List(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Map(entries) => {
            state.write_u8(5);
            state.write_usize(entries.len());
            for (key, item) in entries {
                key.hash(state);
                hash_value(item, state);
            }
        }
    }
}
