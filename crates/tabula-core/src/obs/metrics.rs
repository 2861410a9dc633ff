use crate::obs::sink::{ExecKind, MetricsEvent, MetricsSink};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for operations, overall and per table.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub tables: BTreeMap<String, TableCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            tables: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Terminal entrypoints
    pub load_calls: u64,
    pub insert_calls: u64,
    pub update_calls: u64,
    pub delete_calls: u64,
    pub join_calls: u64,
    pub sql_statements: u64,

    // Rows touched
    pub rows_loaded: u64,
    pub rows_scanned: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
    pub rows_joined: u64,

    // Recovery
    pub corrupt_payloads: u64,

    // Timing
    pub exec_micros_total: u64,
    pub exec_micros_max: u64,
}

///
/// TableCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TableCounters {
    pub load_calls: u64,
    pub update_calls: u64,
    pub delete_calls: u64,
    pub rows_loaded: u64,
    pub rows_scanned: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
    pub corrupt_payloads: u64,
}

///
/// EventReport
/// Counter snapshot plus per-table averages.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    pub counters: Option<EventState>,
    pub table_counters: Vec<TableSummary>,
}

///
/// TableSummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub load_calls: u64,
    pub rows_loaded: u64,
    pub rows_scanned: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
    pub avg_rows_per_load: f64,
    pub avg_rows_scanned_per_load: f64,
    pub corrupt_payloads: u64,
}

///
/// EventMetrics
///
/// Default process-local sink that accumulates counters. Owned by an
/// `Environment` and shared with every table it opens.
///

#[derive(Debug, Default)]
pub struct EventMetrics {
    state: Mutex<EventState>,
}

impl EventMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone the raw counter state.
    #[must_use]
    pub fn snapshot(&self) -> EventState {
        self.lock().clone()
    }

    /// Reset all counters.
    pub fn reset(&self) {
        *self.lock() = EventState::default();
    }

    /// Build a metrics report from in-memory counters only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn report(&self) -> EventReport {
        let snap = self.snapshot();

        let mut table_counters: Vec<TableSummary> = snap
            .tables
            .iter()
            .map(|(table, ops)| {
                let (avg_load, avg_scanned) = if ops.load_calls > 0 {
                    (
                        ops.rows_loaded as f64 / ops.load_calls as f64,
                        ops.rows_scanned as f64 / ops.load_calls as f64,
                    )
                } else {
                    (0.0, 0.0)
                };

                TableSummary {
                    table: table.clone(),
                    load_calls: ops.load_calls,
                    rows_loaded: ops.rows_loaded,
                    rows_scanned: ops.rows_scanned,
                    rows_updated: ops.rows_updated,
                    rows_deleted: ops.rows_deleted,
                    avg_rows_per_load: avg_load,
                    avg_rows_scanned_per_load: avg_scanned,
                    corrupt_payloads: ops.corrupt_payloads,
                }
            })
            .collect();

        table_counters.sort_by(|a, b| {
            b.avg_rows_per_load
                .total_cmp(&a.avg_rows_per_load)
                .then_with(|| a.table.cmp(&b.table))
        });

        EventReport {
            counters: Some(snap),
            table_counters,
        }
    }
}

impl MetricsSink for EventMetrics {
    fn record(&self, event: MetricsEvent<'_>) {
        let mut m = self.lock();

        match event {
            MetricsEvent::ExecStart { kind, table } => {
                let ops = &mut m.ops;
                match kind {
                    ExecKind::Load => ops.load_calls = ops.load_calls.saturating_add(1),
                    ExecKind::Insert => ops.insert_calls = ops.insert_calls.saturating_add(1),
                    ExecKind::Update => ops.update_calls = ops.update_calls.saturating_add(1),
                    ExecKind::Delete => ops.delete_calls = ops.delete_calls.saturating_add(1),
                    ExecKind::Join => ops.join_calls = ops.join_calls.saturating_add(1),
                }

                let entry = m.tables.entry(table.to_string()).or_default();
                match kind {
                    ExecKind::Load => entry.load_calls = entry.load_calls.saturating_add(1),
                    ExecKind::Update => entry.update_calls = entry.update_calls.saturating_add(1),
                    ExecKind::Delete => entry.delete_calls = entry.delete_calls.saturating_add(1),
                    ExecKind::Insert | ExecKind::Join => {}
                }
            }

            MetricsEvent::ExecFinish {
                kind,
                table,
                rows_touched,
                elapsed_micros,
            } => {
                let ops = &mut m.ops;
                ops.exec_micros_total = ops.exec_micros_total.saturating_add(elapsed_micros);
                ops.exec_micros_max = ops.exec_micros_max.max(elapsed_micros);
                match kind {
                    ExecKind::Load => ops.rows_loaded = ops.rows_loaded.saturating_add(rows_touched),
                    ExecKind::Update => {
                        ops.rows_updated = ops.rows_updated.saturating_add(rows_touched);
                    }
                    ExecKind::Delete => {
                        ops.rows_deleted = ops.rows_deleted.saturating_add(rows_touched);
                    }
                    ExecKind::Join => ops.rows_joined = ops.rows_joined.saturating_add(rows_touched),
                    ExecKind::Insert => {}
                }

                let entry = m.tables.entry(table.to_string()).or_default();
                match kind {
                    ExecKind::Load => {
                        entry.rows_loaded = entry.rows_loaded.saturating_add(rows_touched);
                    }
                    ExecKind::Update => {
                        entry.rows_updated = entry.rows_updated.saturating_add(rows_touched);
                    }
                    ExecKind::Delete => {
                        entry.rows_deleted = entry.rows_deleted.saturating_add(rows_touched);
                    }
                    ExecKind::Insert | ExecKind::Join => {}
                }
            }

            MetricsEvent::RowsScanned {
                table,
                rows_scanned,
            } => {
                m.ops.rows_scanned = m.ops.rows_scanned.saturating_add(rows_scanned);
                let entry = m.tables.entry(table.to_string()).or_default();
                entry.rows_scanned = entry.rows_scanned.saturating_add(rows_scanned);
            }

            MetricsEvent::CorruptPayload { table } => {
                m.ops.corrupt_payloads = m.ops.corrupt_payloads.saturating_add(1);
                let entry = m.tables.entry(table.to_string()).or_default();
                entry.corrupt_payloads = entry.corrupt_payloads.saturating_add(1);
            }

            MetricsEvent::SqlStatement { .. } => {
                m.ops.sql_statements = m.ops.sql_statements.saturating_add(1);
            }
        }
    }
}
