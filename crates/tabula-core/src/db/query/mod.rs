//! Module: db::query
//! Responsibility: transient builder state and the in-memory post-filter
//! pipeline (sort, offset, page window, limit, projection).
//! Does not own: predicate semantics or backend I/O.


use crate::{db::predicate::Condition, record::Record, value::canonical_cmp};

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// Case-insensitive; anything other than `desc` is ascending.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

impl From<&str> for OrderDirection {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

///
/// OrderSpec
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderSpec {
    pub field: String,
    pub direction: OrderDirection,
}

///
/// PageSpec
/// 1-based page number and page size, both at least 1.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageSpec {
    pub page: usize,
    pub per_page: usize,
}

impl PageSpec {
    #[must_use]
    pub const fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: if page == 0 { 1 } else { page },
            per_page: if per_page == 0 { 1 } else { per_page },
        }
    }

    #[must_use]
    pub const fn start(self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

///
/// QueryState
///
/// Everything a builder accumulates between terminal calls.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryState {
    pub filters: Vec<Condition>,
    pub order: Option<OrderSpec>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub page: Option<PageSpec>,
    pub projection: Vec<String>,
}

impl QueryState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Clear every accumulated setting.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Sort, then slice by offset, page window and limit, in that order.
    ///
    /// The sort is stable; descending order reverses the comparator so
    /// equal keys keep their fetch order in both directions.
    #[must_use]
    pub fn apply_window(&self, mut rows: Vec<Record>) -> Vec<Record> {
        if let Some(order) = &self.order {
            let field = order.field.as_str();
            match order.direction {
                OrderDirection::Asc => {
                    rows.sort_by(|a, b| canonical_cmp(a.field(field), b.field(field)));
                }
                OrderDirection::Desc => {
                    rows.sort_by(|a, b| canonical_cmp(b.field(field), a.field(field)));
                }
            }
        }

        let mut iter: Box<dyn Iterator<Item = Record>> = Box::new(rows.into_iter());

        if let Some(offset) = self.offset {
            iter = Box::new(iter.skip(offset));
        }
        if let Some(page) = self.page {
            iter = Box::new(iter.skip(page.start()).take(page.per_page));
        }
        if let Some(limit) = self.limit {
            iter = Box::new(iter.take(limit));
        }

        iter.collect()
    }

    /// Project rows onto the selected fields; no selection keeps rows whole.
    #[must_use]
    pub fn project(&self, rows: Vec<Record>) -> Vec<Record> {
        if self.projection.is_empty() {
            return rows;
        }

        rows.iter().map(|row| row.project(&self.projection)).collect()
    }
}
