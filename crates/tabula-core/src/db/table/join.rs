use crate::{record::Record, value::ValueKey};
use std::{collections::HashMap, fmt, sync::Arc};

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum JoinKind {
    #[default]
    Inner,
    /// Unmatched left rows are kept with no right-hand fields.
    Left,
}

///
/// Selector
///
/// Shapes one output row from a left row and its match (`None` for an
/// unmatched left-join row).
///

pub type Selector = Arc<dyn Fn(&Record, Option<&Record>) -> Record + Send + Sync>;

///
/// JoinOptions
///

#[derive(Clone, Default)]
pub struct JoinOptions {
    pub kind: JoinKind,
    pub select: Option<Selector>,
    pub alias_left: Option<String>,
    pub alias_right: Option<String>,
}

impl JoinOptions {
    #[must_use]
    pub fn inner() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn left() -> Self {
        Self {
            kind: JoinKind::Left,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn select<F>(mut self, selector: F) -> Self
    where
        F: Fn(&Record, Option<&Record>) -> Record + Send + Sync + 'static,
    {
        self.select = Some(Arc::new(selector));
        self
    }

    /// Prefix every left field with `"{left}."` and every right field with
    /// `"{right}."` before shaping.
    #[must_use]
    pub fn alias(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.alias_left = Some(left.into());
        self.alias_right = Some(right.into());
        self
    }
}

impl fmt::Debug for JoinOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOptions")
            .field("kind", &self.kind)
            .field("select", &self.select.as_ref().map(|_| "<fn>"))
            .field("alias_left", &self.alias_left)
            .field("alias_right", &self.alias_right)
            .finish()
    }
}

///
/// JoinResult
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinResult {
    rows: Vec<Record>,
}

impl JoinResult {
    #[must_use]
    pub const fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn to_array(&self) -> &[Record] {
        &self.rows
    }

    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        self.rows.first()
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }
}

/// Hash-join `left` against `right` on `local = foreign`.
///
/// Rows are emitted in left order, and each left row's matches keep right
/// order. Rows where the key field is absent join on `Null` like any other
/// key value.
#[must_use]
pub(crate) fn hash_join(
    left: &[Record],
    right: &[Record],
    local: &str,
    foreign: &str,
    options: &JoinOptions,
) -> Vec<Record> {
    let mut index: HashMap<ValueKey, Vec<&Record>> = HashMap::new();
    for row in right {
        index
            .entry(ValueKey::new(row.field(foreign).clone()))
            .or_default()
            .push(row);
    }

    let mut out = Vec::new();
    for l in left {
        let key = ValueKey::new(l.field(local).clone());
        match index.get(&key) {
            Some(matches) => {
                out.extend(matches.iter().map(|r| shape(l, Some(r), options)));
            }
            None if options.kind == JoinKind::Left => out.push(shape(l, None, options)),
            None => {}
        }
    }

    out
}

fn shape(left: &Record, right: Option<&Record>, options: &JoinOptions) -> Record {
    let left = options
        .alias_left
        .as_deref()
        .map_or_else(|| left.clone(), |alias| left.prefixed(alias));
    let right = right.map(|r| {
        options
            .alias_right
            .as_deref()
            .map_or_else(|| r.clone(), |alias| r.prefixed(alias))
    });

    match &options.select {
        Some(select) => select(&left, right.as_ref()),
        None => match &right {
            Some(r) => left.merged(r),
            None => left,
        },
    }
}
