mod compare;
mod key;


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// re-exports
pub use compare::{canonical_cmp, strict_order_cmp, value_eq};
pub use key::ValueKey;

///
/// Value
///
/// Dynamic field value stored in a record. Serializes untagged so a record
/// round-trips through plain JSON.
///
/// Null     → the field is absent or explicitly null.
/// Int      → integral number; shares one numeric domain with `Float`.
/// Float    → fractional number; `Int(3)` and `Float(3.0)` are equal.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Ordered list of values.
    List(Vec<Self>),
    /// Nested object; keys are kept in sorted order.
    Map(BTreeMap<String, Self>),
}

impl Value {
    ///
    /// CONSTRUCTION
    ///

    /// Build a `Value::List` from owned items.
    pub fn from_list<T>(items: Vec<T>) -> Self
    where
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    ///
    /// TYPES
    ///

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Short lowercase label for the variant, used in diagnostics.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    ///
    /// CONVERSION
    ///

    #[must_use]
    pub const fn as_text(&self) -> Option<&str> {
        if let Self::Text(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_list(&self) -> Option<&[Self]> {
        if let Self::List(xs) = self {
            Some(xs.as_slice())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        if let Self::Bool(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Numeric view of `Int`/`Float` values only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Lossy numeric coercion used by `sum`/`avg`.
    ///
    /// Numeric text parses, booleans map to 1/0, and everything else
    /// (including NaN) coerces to 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce_f64(&self) -> f64 {
        let n = match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(0.0)
                }
            }
            Self::Null | Self::List(_) | Self::Map(_) => 0.0,
        };

        if n.is_nan() { 0.0 } else { n }
    }

    /// Render the value as display text. `Null` renders empty, lists join
    /// their items with `,`, and maps render as an opaque object marker.
    #[must_use]
    pub fn to_text_lossy(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => float_text(*f),
            Self::Text(s) => s.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_text_lossy)
                .collect::<Vec<_>>()
                .join(","),
            Self::Map(_) => "[object Object]".to_string(),
        }
    }

    /// Check whether `needle` (as text) is a case-sensitive substring of
    /// `self` (as text).
    #[must_use]
    pub fn text_contains(&self, needle: &Self) -> bool {
        self.to_text_lossy().contains(&needle.to_text_lossy())
    }
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        f.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        value_eq(self, other)
    }
}

macro_rules! impl_from_for {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for! {
    bool   => Bool,
    i8     => Int,
    i16    => Int,
    i32    => Int,
    i64    => Int,
    u8     => Int,
    u16    => Int,
    u32    => Int,
    f32    => Float,
    f64    => Float,
    &str   => Text,
    String => Text,
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::from_list(items)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<BTreeMap<String, Self>> for Value {
    fn from(map: BTreeMap<String, Self>) -> Self {
        Self::Map(map)
    }
}

impl From<serde_json::Value> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || Self::Float(n.as_f64().unwrap_or(f64::NAN)),
                Self::Int,
            ),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}
