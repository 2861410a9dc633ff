//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! This module does not access storage internals directly.
//! Execution code emits `MetricsEvent`s through an injected `MetricsSink`;
//! human-readable diagnostics go through `tracing`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventMetrics, EventOps, EventReport, EventState, TableCounters, TableSummary};
pub use sink::{ExecKind, MetricsEvent, MetricsSink, NoopMetricsSink};
pub(crate) use sink::Span;
