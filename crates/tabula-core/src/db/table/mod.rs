//! Module: db::table
//! Responsibility: the chainable per-table query builder and its terminal
//! operations (reads, aggregates, bulk mutations, joins).
//! Does not own: predicate semantics, persistence, or SQL tokenization.
//! Boundary: chain methods only accumulate state; every terminal call
//! performs one full fetch from the backend.

mod aggregate;
mod join;

#[cfg(test)]
mod tests;

use crate::{
    db::{
        predicate::{Combinator, Condition, Operand, Operator, apply_filters},
        query::{OrderDirection, OrderSpec, PageSpec, QueryState},
        store::{StorageBackend, UpgradeHook},
    },
    error::InternalError,
    obs::{ExecKind, MetricsEvent, MetricsSink, NoopMetricsSink, Span},
    record::Record,
    value::{Value, ValueKey, value_eq},
};
use std::{cmp::Ordering, collections::HashSet, fmt, sync::Arc};

// re-exports
pub use join::{JoinKind, JoinOptions, JoinResult, Selector};

///
/// Table
///
/// Query builder bound to one backend. Query state is transient: reads
/// reset it, bulk mutations and joins leave it as it was.
///

pub struct Table {
    backend: Arc<dyn StorageBackend>,
    sink: Arc<dyn MetricsSink>,
    state: QueryState,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.backend.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Table {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            sink: Arc::new(NoopMetricsSink),
            state: QueryState::default(),
        }
    }

    #[must_use]
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Ensure the backing table exists.
    pub async fn init(&self, upgrade: Option<&UpgradeHook>) -> Result<(), InternalError> {
        self.backend.init(upgrade).await
    }

    /// Independent builder over the same backend, starting with empty state.
    #[must_use]
    pub fn view(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            sink: self.sink.clone(),
            state: QueryState::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    #[must_use]
    pub fn id_key(&self) -> &str {
        self.backend.id_key()
    }

    #[must_use]
    pub const fn state(&self) -> &QueryState {
        &self.state
    }

    pub(crate) const fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    pub(crate) fn emit(&self, event: MetricsEvent<'_>) {
        self.sink.record(event);
    }

    // ------------------------------------------------------------------
    // Record pass-throughs
    // ------------------------------------------------------------------

    pub async fn insert(&self, record: Record) -> Result<Value, InternalError> {
        let _span = Span::new(self.sink.clone(), self.name(), ExecKind::Insert);

        self.backend.insert(record).await
    }

    pub async fn update(&self, id: impl Into<Value>, record: Record) -> Result<bool, InternalError> {
        let mut span = Span::new(self.sink.clone(), self.name(), ExecKind::Update);
        let updated = self.backend.update(&id.into(), record).await?;
        span.set_rows(u64::from(updated));

        Ok(updated)
    }

    pub async fn delete(&self, id: impl Into<Value>) -> Result<bool, InternalError> {
        let mut span = Span::new(self.sink.clone(), self.name(), ExecKind::Delete);
        let deleted = self.backend.delete(&id.into()).await?;
        span.set_rows(u64::from(deleted));

        Ok(deleted)
    }

    pub async fn clear(&self) -> Result<bool, InternalError> {
        self.backend.clear().await
    }

    /// Look a record up by id. Query state is neither used nor reset.
    pub async fn find_by_id(
        &self,
        id: impl Into<Value>,
    ) -> Result<Option<Record>, InternalError> {
        let id = id.into();
        let id_key = self.id_key();

        let rows = self.backend.fetch_all().await?;

        Ok(rows
            .into_iter()
            .find(|row| value_eq(row.field(id_key), &id)))
    }

    // ------------------------------------------------------------------
    // Chain methods (pure state accumulation)
    // ------------------------------------------------------------------

    /// Add an AND condition. `operand` is either `(op, value)` or a bare
    /// value compared with `=`.
    pub fn where_(
        &mut self,
        field: impl Into<String>,
        operand: impl Into<Operand>,
    ) -> &mut Self {
        self.push_condition(Combinator::And, field.into(), operand.into())
    }

    /// Add an OR condition; same operand rules as [`Self::where_`].
    pub fn or_where(
        &mut self,
        field: impl Into<String>,
        operand: impl Into<Operand>,
    ) -> &mut Self {
        self.push_condition(Combinator::Or, field.into(), operand.into())
    }

    fn push_condition(
        &mut self,
        combinator: Combinator,
        field: String,
        operand: Operand,
    ) -> &mut Self {
        match operand.operator() {
            Ok(op) => {
                let value = operand.into_value();
                self.state
                    .filters
                    .push(Condition::new(combinator, field, op, value));
            }
            Err(err) => {
                tracing::warn!(table = %self.name(), %field, %err, "filter dropped");
            }
        }

        self
    }

    pub fn where_in<I, V>(&mut self, field: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = Value::List(values.into_iter().map(Into::into).collect());
        self.where_(field, (Operator::In, list))
    }

    pub fn where_between(
        &mut self,
        field: impl Into<String>,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> &mut Self {
        let bounds = Value::List(vec![min.into(), max.into()]);
        self.where_(field, (Operator::Between, bounds))
    }

    pub fn where_null(&mut self, field: impl Into<String>) -> &mut Self {
        self.where_(field, (Operator::IsNull, Value::Null))
    }

    pub fn where_not_null(&mut self, field: impl Into<String>) -> &mut Self {
        self.where_(field, (Operator::IsNotNull, Value::Null))
    }

    /// `direction` is case-insensitive; anything but `desc` sorts ascending.
    pub fn order_by(
        &mut self,
        field: impl Into<String>,
        direction: impl Into<OrderDirection>,
    ) -> &mut Self {
        self.state.order = Some(OrderSpec {
            field: field.into(),
            direction: direction.into(),
        });
        self
    }

    /// Skip `n` rows after sorting and before the page window.
    pub const fn offset(&mut self, n: usize) -> &mut Self {
        self.state.offset = Some(n);
        self
    }

    pub const fn limit(&mut self, n: usize) -> &mut Self {
        self.state.limit = Some(n);
        self
    }

    /// 1-based page window; both arguments clamp to at least 1.
    pub fn paginate(&mut self, page: usize, per_page: usize) -> &mut Self {
        if page == 0 || per_page == 0 {
            tracing::warn!(table = %self.name(), page, per_page, "pagination clamped to 1");
        }
        self.state.page = Some(PageSpec::new(page, per_page));
        self
    }

    /// Project returned rows onto `fields`. An empty list keeps every field.
    pub fn select<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.projection = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Drop every accumulated setting.
    pub fn reset(&mut self) -> &mut Self {
        self.state.reset();
        self
    }

    // ------------------------------------------------------------------
    // Terminal reads (reset state on success)
    // ------------------------------------------------------------------

    async fn filtered(&self, filters: &[Condition]) -> Result<Vec<Record>, InternalError> {
        let rows = self.backend.fetch_all().await?;
        self.sink.record(MetricsEvent::RowsScanned {
            table: self.name(),
            rows_scanned: row_count(rows.len()),
        });

        Ok(apply_filters(rows, filters))
    }

    async fn load(&self, state: &QueryState) -> Result<Vec<Record>, InternalError> {
        let mut span = Span::new(self.sink.clone(), self.name(), ExecKind::Load);

        let rows = self.filtered(&state.filters).await?;
        let rows = state.project(state.apply_window(rows));
        span.set_rows(row_count(rows.len()));

        tracing::debug!(
            table = %self.name(),
            filters = state.filters.len(),
            rows = rows.len(),
            "load executed"
        );

        Ok(rows)
    }

    /// Fetch, filter, sort, window and project, then reset query state.
    pub async fn get(&mut self) -> Result<Vec<Record>, InternalError> {
        let rows = self.load(&self.state).await?;
        self.state.reset();

        Ok(rows)
    }

    pub async fn first(&mut self) -> Result<Option<Record>, InternalError> {
        self.limit(1);

        Ok(self.get().await?.into_iter().next())
    }

    pub async fn count(&mut self) -> Result<usize, InternalError> {
        Ok(self.get().await?.len())
    }

    pub async fn exists(&mut self) -> Result<bool, InternalError> {
        self.limit(1);

        Ok(!self.get().await?.is_empty())
    }

    pub async fn pluck(&mut self, field: &str) -> Result<Vec<Value>, InternalError> {
        Ok(aggregate::pluck(&self.get().await?, field))
    }

    /// Unique values of `field` in first-seen order.
    pub async fn distinct(&mut self, field: &str) -> Result<Vec<Value>, InternalError> {
        Ok(aggregate::distinct(&self.get().await?, field))
    }

    pub async fn sum(&mut self, field: &str) -> Result<f64, InternalError> {
        Ok(aggregate::sum(&self.get().await?, field))
    }

    /// Mean over the same rows `sum` would see; 0 when nothing matches.
    pub async fn avg(&mut self, field: &str) -> Result<f64, InternalError> {
        Ok(aggregate::avg(&self.get().await?, field))
    }

    pub async fn min(&mut self, field: &str) -> Result<Option<Value>, InternalError> {
        Ok(aggregate::extreme(&self.get().await?, field, Ordering::Less))
    }

    pub async fn max(&mut self, field: &str) -> Result<Option<Value>, InternalError> {
        Ok(aggregate::extreme(&self.get().await?, field, Ordering::Greater))
    }

    // ------------------------------------------------------------------
    // Bulk mutations (state left intact)
    // ------------------------------------------------------------------

    /// Merge `patch` into every matching record, one backend call per
    /// record in fetch order. A failure stops the loop; earlier updates
    /// stay applied. Returns the number of records written.
    pub async fn update_where(&self, patch: &Record) -> Result<usize, InternalError> {
        let mut span = Span::new(self.sink.clone(), self.name(), ExecKind::Update);
        let targets = self.filtered(&self.state.filters).await?;
        let id_key = self.id_key().to_string();

        let mut written = 0;
        for row in targets {
            let id = self.record_id(&row, &id_key)?;
            if self.backend.update(&id, row.merged(patch)).await? {
                written += 1;
                span.add_rows(1);
            }
        }

        tracing::debug!(table = %self.name(), written, "update_where applied");

        Ok(written)
    }

    /// Delete every matching record, one backend call per record in fetch
    /// order. Returns the number of records targeted.
    pub async fn delete_where(&self) -> Result<usize, InternalError> {
        let mut span = Span::new(self.sink.clone(), self.name(), ExecKind::Delete);
        let targets = self.filtered(&self.state.filters).await?;
        let id_key = self.id_key().to_string();

        let mut removed = 0;
        for row in targets {
            let id = self.record_id(&row, &id_key)?;
            self.backend.delete(&id).await?;
            removed += 1;
            span.add_rows(1);
        }

        tracing::debug!(table = %self.name(), removed, "delete_where applied");

        Ok(removed)
    }

    // Stored records always carry an id; a row without one cannot be
    // addressed for a write.
    fn record_id(&self, row: &Record, id_key: &str) -> Result<Value, InternalError> {
        let id = row.field(id_key);
        if id.is_null() {
            return Err(InternalError::executor_invariant(format!(
                "record in '{}' has no '{id_key}' field",
                self.name()
            )));
        }

        Ok(id.clone())
    }

    // ------------------------------------------------------------------
    // Join
    // ------------------------------------------------------------------

    /// Join this builder's filtered rows against `other`'s on
    /// `local_field = foreign_field`.
    ///
    /// Each side is filtered by its own conditions; the output is then
    /// sorted and windowed by this builder's order, offset, page and limit.
    /// Neither builder's state is consumed.
    pub async fn join(
        &self,
        other: &Self,
        local_field: &str,
        foreign_field: &str,
        options: JoinOptions,
    ) -> Result<JoinResult, InternalError> {
        let mut span = Span::new(self.sink.clone(), self.name(), ExecKind::Join);

        let left = self.filtered(&self.state.filters).await?;
        let right = other.filtered(&other.state.filters).await?;

        let joined = join::hash_join(&left, &right, local_field, foreign_field, &options);
        let window = QueryState {
            filters: Vec::new(),
            projection: Vec::new(),
            ..self.state.clone()
        };
        let rows = window.apply_window(joined);
        span.set_rows(row_count(rows.len()));

        tracing::debug!(
            left = %self.name(),
            right = %other.name(),
            kind = ?options.kind,
            rows = rows.len(),
            "join executed"
        );

        Ok(JoinResult::new(rows))
    }

    // ------------------------------------------------------------------
    // Backup / restore
    // ------------------------------------------------------------------

    /// Every record as one JSON array, in backend order.
    pub async fn export_json(&self) -> Result<String, InternalError> {
        let rows = self.backend.fetch_all().await?;

        Ok(serde_json::to_string(&rows)?)
    }

    /// Replace the table's contents with the records of a JSON array.
    /// Records keep their ids; records without one get a fresh id.
    /// Returns the number of records imported.
    ///
    /// The payload is rejected before anything is cleared when it repeats
    /// an id.
    pub async fn import_json(&self, text: &str) -> Result<usize, InternalError> {
        let rows: Vec<Record> = serde_json::from_str(text)?;

        let id_key = self.id_key();
        let mut seen = HashSet::new();
        for row in &rows {
            let id = row.field(id_key);
            if !id.is_null() && !seen.insert(ValueKey::new(id.clone())) {
                return Err(InternalError::store_conflict(
                    self.name(),
                    id.to_text_lossy(),
                ));
            }
        }

        self.backend.clear().await?;
        let count = rows.len();
        for row in rows {
            self.backend.insert(row).await?;
        }

        Ok(count)
    }
}

fn row_count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}
