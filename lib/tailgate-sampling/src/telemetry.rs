//! Internal telemetry.
//!
//! Metrics are emitted through the `metrics` facade, and are only recorded if a recorder has been installed by the
//! application.

use metrics::counter;

use crate::Decision;

/// Number of decisions made, labeled by composition strategy and decision.
pub const DECISIONS_TOTAL: &str = "tailgate_decisions_total";

/// Number of trace buffers created.
pub const TRACES_BUFFERED_TOTAL: &str = "tailgate_traces_buffered_total";

/// Number of spans appended to trace buffers.
pub const SPANS_BUFFERED_TOTAL: &str = "tailgate_spans_buffered_total";

/// Number of spans that arrived after their trace buffer was finalized.
pub const LATE_SPANS_TOTAL: &str = "tailgate_late_spans_total";

/// Number of trace buffers evicted from the registry and finalized.
///
/// A buffer that was already finalized when it was removed is not counted.
pub const TRACES_EVICTED_TOTAL: &str = "tailgate_traces_evicted_total";

pub(crate) fn record_decision(strategy: &'static str, decision: Decision) {
    counter!(DECISIONS_TOTAL, "strategy" => strategy, "decision" => decision.as_str()).increment(1);
}

pub(crate) fn record_trace_buffered() {
    counter!(TRACES_BUFFERED_TOTAL).increment(1);
}

pub(crate) fn record_spans_buffered(count: usize) {
    counter!(SPANS_BUFFERED_TOTAL).increment(count as u64);
}

pub(crate) fn record_late_spans(count: usize) {
    counter!(LATE_SPANS_TOTAL).increment(count as u64);
}

pub(crate) fn record_trace_evicted() {
    counter!(TRACES_EVICTED_TOTAL).increment(1);
}
