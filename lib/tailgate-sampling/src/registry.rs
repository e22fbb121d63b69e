use std::sync::Arc;

use tailgate_data::{TraceId, Traces};
use tracing::debug;

use crate::{telemetry, BufferError, TraceData};

/// Summary of a single ingestion call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IngestSummary {
    /// Number of trace buffers created.
    pub new_traces: usize,

    /// Number of spans appended to trace buffers.
    pub spans_buffered: usize,

    /// Number of spans dropped because their trace buffer was already finalized.
    pub late_spans: usize,
}

/// Trace buffer registry.
///
/// Maps trace IDs to their buffers. The map itself is lock-free for readers, and each buffer carries its own lock, so
/// ingesting into or evaluating one trace never blocks unrelated traces.
#[derive(Debug, Default)]
pub struct TraceBuffers {
    traces: papaya::HashMap<TraceId, Arc<TraceData>, ahash::RandomState>,
}

impl TraceBuffers {
    /// Creates an empty `TraceBuffers`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests a payload of spans.
    ///
    /// The payload is split by trace ID, and each trace receives one new batch holding its spans. Buffers are created
    /// on the first arrival of a trace ID.
    pub fn ingest(&self, traces: Traces) -> IngestSummary {
        let mut summary = IngestSummary::default();
        let map = self.traces.pin();

        for (trace_id, grouped) in traces.group_by_trace_id() {
            let data = match map.get(&trace_id) {
                Some(existing) => Arc::clone(existing),
                None => match map.try_insert(trace_id, Arc::new(TraceData::new(trace_id))) {
                    Ok(inserted) => {
                        summary.new_traces += 1;
                        telemetry::record_trace_buffered();
                        Arc::clone(inserted)
                    }
                    Err(occupied) => Arc::clone(occupied.current),
                },
            };

            for batch in grouped {
                let spans = batch.span_count();
                match data.append(batch) {
                    Ok(()) => summary.spans_buffered += spans,
                    Err(BufferError::Finalized { .. }) => {
                        debug!(%trace_id, spans, "Dropping late spans for already-decided trace.");
                        summary.late_spans += spans;
                    }
                }
            }
        }

        if summary.spans_buffered > 0 {
            telemetry::record_spans_buffered(summary.spans_buffered);
        }
        if summary.late_spans > 0 {
            telemetry::record_late_spans(summary.late_spans);
        }

        summary
    }

    /// Returns the buffer for the given trace ID, if one exists.
    pub fn get(&self, trace_id: &TraceId) -> Option<Arc<TraceData>> {
        self.traces.pin().get(trace_id).cloned()
    }

    /// Returns the number of buffered traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Returns `true` if no traces are buffered.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Returns the IDs of all buffered traces, sorted by the arrival of their first batch.
    ///
    /// Traces first seen in the same payload keep their order within that payload.
    pub fn trace_ids(&self) -> Vec<TraceId> {
        let map = self.traces.pin();
        let mut entries = map
            .iter()
            .map(|(trace_id, data)| (data.sequence(), *trace_id))
            .collect::<Vec<_>>();
        entries.sort_unstable_by_key(|(sequence, _)| *sequence);
        entries.into_iter().map(|(_, trace_id)| trace_id).collect()
    }

    /// Removes the buffer for the given trace ID and finalizes it, returning its batches.
    ///
    /// Returns `None` if no buffer exists, or if the buffer had already been finalized elsewhere.
    pub fn evict(&self, trace_id: &TraceId) -> Option<Traces> {
        let data = self.traces.pin().remove(trace_id).cloned()?;

        match data.finalize() {
            Ok(batches) => {
                telemetry::record_trace_evicted();
                debug!(%trace_id, spans = batches.span_count(), "Evicted trace buffer.");
                Some(batches)
            }
            Err(e) => {
                debug!(%trace_id, error = %e, "Evicted trace buffer that was already finalized.");
                None
            }
        }
    }
}
