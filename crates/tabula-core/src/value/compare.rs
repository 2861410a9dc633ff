use crate::value::Value;
use std::cmp::Ordering;

// 2^63 as f64; every finite float at or beyond this lies outside i64.
const I64_BOUND_F64: f64 = 9_223_372_036_854_775_808.0;

/// Equality used by predicates, records and tests.
///
/// `Int` and `Float` share one numeric domain. NaN is never equal to
/// anything. Lists and maps compare structurally.
#[must_use]
pub fn value_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
            !f.is_nan() && cmp_int_float(*i, *f) == Ordering::Equal
        }
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| value_eq(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && value_eq(va, vb))
        }
        _ => false,
    }
}

/// Strict comparator for orderable values of the same family.
///
/// Returns `None` for mismatched families, `Null`, collections, and any
/// comparison involving NaN. Predicates treat `None` as a non-match.
#[must_use]
pub fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(i), Value::Float(f)) => (!f.is_nan()).then(|| cmp_int_float(*i, *f)),
        (Value::Float(f), Value::Int(i)) => {
            (!f.is_nan()).then(|| cmp_int_float(*i, *f).reverse())
        }
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total canonical comparator used for sorting and key ordering.
///
/// Ordering rules:
/// 1. Canonical variant rank (null, bool, number, text, list, map)
/// 2. Variant-specific comparison for same-ranked values
///
/// NaN sorts after every other number. Mixed-variant comparisons are
/// rank-only and must remain deterministic.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = canonical_rank(left).cmp(&canonical_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    canonical_cmp_same_rank(left, right)
}

const fn canonical_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::List(_) => 4,
        Value::Map(_) => 5,
    }
}

fn canonical_cmp_same_rank(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => cmp_float_total(*a, *b),
        (Value::Int(i), Value::Float(f)) => {
            if f.is_nan() {
                Ordering::Less
            } else {
                cmp_int_float(*i, *f)
            }
        }
        (Value::Float(f), Value::Int(i)) => {
            if f.is_nan() {
                Ordering::Greater
            } else {
                cmp_int_float(*i, *f).reverse()
            }
        }
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => {
            for (left, right) in a.iter().zip(b.iter()) {
                let cmp = canonical_cmp(left, right);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }

            a.len().cmp(&b.len())
        }
        (Value::Map(a), Value::Map(b)) => {
            for ((left_key, left_value), (right_key, right_value)) in a.iter().zip(b.iter()) {
                let key_cmp = left_key.cmp(right_key);
                if key_cmp != Ordering::Equal {
                    return key_cmp;
                }

                let value_cmp = canonical_cmp(left_value, right_value);
                if value_cmp != Ordering::Equal {
                    return value_cmp;
                }
            }

            a.len().cmp(&b.len())
        }
        _ => Ordering::Equal,
    }
}

// NaN is greatest and equal to itself; -0.0 equals 0.0.
fn cmp_float_total(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison of an integer against a non-NaN float.
#[allow(clippy::cast_possible_truncation)]
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f >= I64_BOUND_F64 {
        return Ordering::Less;
    }
    if f < -I64_BOUND_F64 {
        return Ordering::Greater;
    }

    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => {
            if f > whole {
                Ordering::Less
            } else if f < whole {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        other => other,
    }
}
