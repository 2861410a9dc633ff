//! Metrics sink boundary.
//!
//! Core DB logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and an injected MetricsSink.
use std::{sync::Arc, time::Instant};

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Load,
    Insert,
    Update,
    Delete,
    Join,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        table: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        table: &'a str,
        rows_touched: u64,
        elapsed_micros: u64,
    },
    RowsScanned {
        table: &'a str,
        rows_scanned: u64,
    },
    /// Persisted payload could not be decoded and was replaced by an empty
    /// collection.
    CorruptPayload {
        table: &'a str,
    },
    SqlStatement {
        table: &'a str,
        kind: ExecKind,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent<'_>);
}

///
/// NoopMetricsSink
/// Discards every event.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record(&self, _: MetricsEvent<'_>) {}
}

///
/// Span
/// RAII guard that emits start/finish metrics events for one terminal call.
/// Ensures finish accounting happens even when the call fails early.
///

pub(crate) struct Span {
    sink: Arc<dyn MetricsSink>,
    table: String,
    kind: ExecKind,
    started: Instant,
    rows: u64,
}

impl Span {
    #[must_use]
    /// Start a metrics span for a table and execution kind.
    pub(crate) fn new(sink: Arc<dyn MetricsSink>, table: &str, kind: ExecKind) -> Self {
        sink.record(MetricsEvent::ExecStart { kind, table });

        Self {
            sink,
            table: table.to_string(),
            kind,
            started: Instant::now(),
            rows: 0,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }

    pub(crate) const fn add_rows(&mut self, rows: u64) {
        self.rows = self.rows.saturating_add(rows);
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let elapsed_micros = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);

        self.sink.record(MetricsEvent::ExecFinish {
            kind: self.kind,
            table: &self.table,
            rows_touched: self.rows,
            elapsed_micros,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl MetricsSink for RecordingSink {
        fn record(&self, event: MetricsEvent<'_>) {
            let label = match event {
                MetricsEvent::ExecStart { kind, table } => format!("start:{kind:?}:{table}"),
                MetricsEvent::ExecFinish {
                    kind,
                    table,
                    rows_touched,
                    ..
                } => format!("finish:{kind:?}:{table}:{rows_touched}"),
                other => format!("{other:?}"),
            };
            self.events.lock().expect("events lock").push(label);
        }
    }

    #[test]
    fn span_emits_start_and_finish_with_rows() {
        let sink = Arc::new(RecordingSink::default());

        {
            let mut span = Span::new(sink.clone(), "db:users", ExecKind::Load);
            span.set_rows(2);
            span.add_rows(3);
        }

        let events = sink.events.lock().expect("events lock").clone();
        assert_eq!(
            events,
            vec![
                "start:Load:db:users".to_string(),
                "finish:Load:db:users:5".to_string()
            ]
        );
    }

    #[test]
    fn span_finishes_on_early_drop() {
        let sink = Arc::new(RecordingSink::default());

        let run = |sink: Arc<RecordingSink>| -> Result<(), ()> {
            let _span = Span::new(sink, "db:users", ExecKind::Delete);
            Err(())
        };
        assert!(run(sink.clone()).is_err());

        let events = sink.events.lock().expect("events lock").clone();
        assert_eq!(events.len(), 2);
        assert!(events[1].starts_with("finish:Delete"));
    }
}
