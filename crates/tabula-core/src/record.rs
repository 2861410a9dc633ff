use crate::{error::InternalError, value::Value};
use derive_more::{Deref, DerefMut, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

///
/// Record
///
/// Schema-less mapping from field name to [`Value`]. An absent field reads
/// as `Null`; the table's id key identifies the record inside its store.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Deserialize, IntoIterator, PartialEq, Serialize)]
#[into_iterator(owned, ref)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Read a field, treating an absent field as `Null`.
    #[must_use]
    pub fn field(&self, name: &str) -> &Value {
        self.0.get(name).unwrap_or(&NULL)
    }

    /// Builder-style field assignment.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Shallow merge; fields of `patch` overwrite fields of `self`.
    #[must_use]
    pub fn merged(&self, patch: &Self) -> Self {
        let mut out = self.clone();
        out.0
            .extend(patch.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    /// Copy of this record with every field renamed to `"{prefix}.{field}"`.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self(
            self.0
                .iter()
                .map(|(k, v)| (format!("{prefix}.{k}"), v.clone()))
                .collect(),
        )
    }

    /// Keep only the listed fields; fields missing from the record are omitted.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Self {
        Self(
            fields
                .iter()
                .filter_map(|f| self.0.get(f).map(|v| (f.clone(), v.clone())))
                .collect(),
        )
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self(fields)
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = InternalError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match Value::from(json) {
            Value::Map(fields) => Ok(Self(fields)),
            other => Err(InternalError::serialize_internal(format!(
                "record must be a JSON object, found {}",
                other.kind_label()
            ))),
        }
    }
}
