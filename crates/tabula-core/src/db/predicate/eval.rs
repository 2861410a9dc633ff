use crate::{
    db::predicate::{Combinator, Condition, Operator},
    record::Record,
    value::{Value, strict_order_cmp, value_eq},
};
use std::cmp::Ordering;

/// Evaluate one `field op value` condition against a record.
///
/// Absent fields read as `Null`. Ordering operators are false whenever the
/// two sides are not natively comparable.
#[must_use]
pub fn matches(record: &Record, field: &str, op: Operator, value: &Value) -> bool {
    let actual = record.field(field);

    match op {
        Operator::Eq => value_eq(actual, value),
        Operator::Ne => !value_eq(actual, value),
        Operator::Gt => ordered(actual, value, Ordering::is_gt),
        Operator::Lt => ordered(actual, value, Ordering::is_lt),
        Operator::Gte => ordered(actual, value, Ordering::is_ge),
        Operator::Lte => ordered(actual, value, Ordering::is_le),
        Operator::Like => actual.text_contains(value),
        Operator::In => value
            .as_list()
            .is_some_and(|items| items.iter().any(|item| value_eq(actual, item))),
        Operator::Between => match value.as_list() {
            Some([low, high]) => {
                ordered(actual, low, Ordering::is_ge) && ordered(actual, high, Ordering::is_le)
            }
            _ => false,
        },
        Operator::IsNull => actual.is_null(),
        Operator::IsNotNull => !actual.is_null(),
    }
}

fn ordered(left: &Value, right: &Value, accept: fn(Ordering) -> bool) -> bool {
    strict_order_cmp(left, right).is_some_and(accept)
}

/// Apply the flat two-group rule to one record.
///
/// `And` conditions fold into a group that starts `true`, `Or` conditions
/// fold into a group that starts `false`; the record passes if either group
/// holds. An empty condition list therefore passes every record, and a list
/// made only of `Or` conditions does too.
#[must_use]
pub fn passes(record: &Record, filters: &[Condition]) -> bool {
    if filters.is_empty() {
        return true;
    }

    let mut and_group = true;
    let mut or_group = false;

    for cond in filters {
        let hit = matches(record, &cond.field, cond.op, &cond.value);
        match cond.combinator {
            Combinator::And => and_group = and_group && hit,
            Combinator::Or => or_group = or_group || hit,
        }
    }

    and_group || or_group
}

/// Retain the rows that pass `filters`, preserving fetch order.
#[must_use]
pub fn apply_filters(rows: Vec<Record>, filters: &[Condition]) -> Vec<Record> {
    if filters.is_empty() {
        return rows;
    }

    rows.into_iter().filter(|row| passes(row, filters)).collect()
}
