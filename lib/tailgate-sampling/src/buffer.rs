use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering::Relaxed},
        Mutex, MutexGuard, PoisonError,
    },
    time::Instant,
};

use snafu::{ensure, Snafu};
use tailgate_data::{ResourceSpans, TraceId, Traces};
use tracing::trace;

// Orders buffers by creation even when `Instant` has coarse resolution.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A trace buffer error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum BufferError {
    /// The trace buffer was mutated after it was finalized.
    #[snafu(display("Trace buffer for trace ID {} was already finalized.", trace_id))]
    Finalized {
        /// Trace ID of the buffer.
        trace_id: TraceId,
    },
}

#[derive(Debug, Default)]
struct State {
    batches: Traces,
    finalized: bool,
}

/// A buffered trace.
///
/// Holds every arrival batch received so far for a single trace ID. The ingestion path appends to it, while the
/// decision path reads it (and occasionally tags it) when a decision is made. A single exclusive lock guards every
/// read and every write, and the lock is only ever held for the duration of a scoped call, so it is released on every
/// exit path.
///
/// Batches are append-only: no batch is removed individually. Once a final decision has been made, the buffer is
/// [finalized][Self::finalize], which hands its batches over for flushing and rejects any further mutation.
#[derive(Debug)]
pub struct TraceData {
    trace_id: TraceId,
    arrival: Instant,
    sequence: u64,
    span_count: AtomicUsize,
    state: Mutex<State>,
}

impl TraceData {
    /// Creates an empty buffer for the given trace ID.
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            arrival: Instant::now(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Relaxed),
            span_count: AtomicUsize::new(0),
            state: Mutex::new(State::default()),
        }
    }

    /// Creates a buffer for the given trace ID that already holds the given batches.
    pub fn from_traces(trace_id: TraceId, batches: Traces) -> Self {
        let span_count = batches.span_count();
        Self {
            trace_id,
            arrival: Instant::now(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Relaxed),
            span_count: AtomicUsize::new(span_count),
            state: Mutex::new(State {
                batches,
                finalized: false,
            }),
        }
    }

    // A predicate that panicked mid-traversal leaves the batches intact, as traversals never mutate.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the trace ID.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Returns the instant at which the first batch for this trace arrived.
    pub fn arrival(&self) -> Instant {
        self.arrival
    }

    /// Returns the creation sequence number of this buffer.
    ///
    /// Sequence numbers are unique within the process and increase with every buffer created, so buffers created one
    /// after another on the same thread always compare in creation order.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the number of spans appended to this buffer so far.
    ///
    /// This does not acquire the buffer lock.
    pub fn span_count(&self) -> usize {
        self.span_count.load(Relaxed)
    }

    /// Returns the number of batches currently held.
    pub fn batch_count(&self) -> usize {
        self.lock().batches.resource_spans().len()
    }

    /// Returns `true` if the buffer has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.lock().finalized
    }

    /// Appends an arrival batch.
    ///
    /// # Errors
    ///
    /// If the buffer has already been finalized, an error is returned and the batch is not appended.
    pub fn append(&self, batch: ResourceSpans) -> Result<(), BufferError> {
        let mut state = self.lock();
        ensure!(!state.finalized, Finalized { trace_id: self.trace_id });

        let spans = batch.span_count();
        state.batches.append(batch);
        self.span_count.fetch_add(spans, Relaxed);

        trace!(trace_id = %self.trace_id, spans, batches = state.batches.resource_spans().len(), "Appended batch to trace buffer.");
        Ok(())
    }

    /// Sets `key` to `value` on the attributes of every scope span group in the buffer.
    ///
    /// All batches are visited under the buffer lock, so concurrent readers observe either none or all of the
    /// updated scopes. Concurrent calls are serialized, with the last call winning.
    ///
    /// # Errors
    ///
    /// If the buffer has already been finalized, an error is returned and nothing is tagged.
    pub fn tag_scope_attribute(&self, key: &str, value: &str) -> Result<(), BufferError> {
        let mut state = self.lock();
        ensure!(!state.finalized, Finalized { trace_id: self.trace_id });

        for rs in state.batches.resource_spans_mut() {
            for ss in rs.scope_spans_mut() {
                ss.scope_mut().attributes_mut().insert_str(key, value);
            }
        }
        Ok(())
    }

    /// Runs `f` against the buffered batches while holding the buffer lock.
    ///
    /// The lock is held for the entire call and released when `f` returns, whether it returns early or not. `f` must
    /// not call back into this buffer.
    pub fn with_batches<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Traces) -> R,
    {
        let state = self.lock();
        f(&state.batches)
    }

    /// Returns a copy of the buffered batches.
    pub fn snapshot(&self) -> Traces {
        self.lock().batches.clone()
    }

    /// Finalizes the buffer, taking its batches.
    ///
    /// After finalization, the buffer reads as empty and rejects any further mutation.
    ///
    /// # Errors
    ///
    /// If the buffer has already been finalized, an error is returned.
    pub fn finalize(&self) -> Result<Traces, BufferError> {
        let mut state = self.lock();
        ensure!(!state.finalized, Finalized { trace_id: self.trace_id });

        state.finalized = true;
        Ok(std::mem::take(&mut state.batches))
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use tailgate_data::{AttributeMap, InstrumentationScope, Resource, ScopeSpans, Span, SpanId};

    use super::*;

    fn batch(trace_id: TraceId, scopes: usize, spans_per_scope: u64) -> ResourceSpans {
        let scope_spans = (0..scopes)
            .map(|i| {
                let spans = (0..spans_per_scope)
                    .map(|j| Span::new(trace_id, SpanId::from(j + 1), "op"))
                    .collect();
                ScopeSpans::new(
                    InstrumentationScope::new(format!("scope-{}", i)).with_attributes(AttributeMap::new().with("existing", 1i64)),
                    spans,
                )
            })
            .collect();
        ResourceSpans::new(Resource::default(), scope_spans)
    }

    #[test]
    fn append_tracks_batches_and_spans() {
        let trace_id = TraceId::from(7u128);
        let data = TraceData::new(trace_id);
        assert_eq!(data.span_count(), 0);
        assert_eq!(data.batch_count(), 0);

        data.append(batch(trace_id, 2, 3)).unwrap();
        data.append(batch(trace_id, 1, 1)).unwrap();

        assert_eq!(data.trace_id(), trace_id);
        assert_eq!(data.span_count(), 7);
        assert_eq!(data.batch_count(), 2);
        assert_eq!(data.with_batches(|traces| traces.span_count()), 7);
    }

    #[test]
    fn from_traces_counts_spans() {
        let trace_id = TraceId::from(8u128);
        let data = TraceData::from_traces(trace_id, Traces::from(batch(trace_id, 2, 2)));
        assert_eq!(data.span_count(), 4);
        assert_eq!(data.batch_count(), 1);
    }

    #[test]
    fn sequence_follows_creation_order() {
        let first = TraceData::new(TraceId::from(2u128));
        let second = TraceData::new(TraceId::from(1u128));
        assert!(first.sequence() < second.sequence());
        assert!(first.arrival() <= second.arrival());
    }

    #[test]
    fn tag_scope_attribute_visits_every_scope() {
        let trace_id = TraceId::from(1u128);
        let data = TraceData::new(trace_id);
        data.append(batch(trace_id, 2, 1)).unwrap();
        data.append(batch(trace_id, 3, 1)).unwrap();

        data.tag_scope_attribute("tailsampling.policy", "first").unwrap();
        data.tag_scope_attribute("tailsampling.policy", "second").unwrap();

        let snapshot = data.snapshot();
        let mut scopes = 0;
        for rs in snapshot.resource_spans() {
            for ss in rs.scope_spans() {
                scopes += 1;
                let attributes = ss.scope().attributes();
                assert_eq!(attributes.get_str("tailsampling.policy"), Some("second"));
                assert!(attributes.contains_key("existing"));
                assert_eq!(attributes.len(), 2);
            }
        }
        assert_eq!(scopes, 5);
    }

    #[test]
    fn finalized_buffer_rejects_mutation() {
        let trace_id = TraceId::from(2u128);
        let data = TraceData::new(trace_id);
        data.append(batch(trace_id, 1, 2)).unwrap();

        let flushed = data.finalize().unwrap();
        assert_eq!(flushed.span_count(), 2);
        assert!(data.is_finalized());
        assert_eq!(data.batch_count(), 0);

        assert!(matches!(
            data.append(batch(trace_id, 1, 1)),
            Err(BufferError::Finalized { trace_id: id }) if id == trace_id
        ));
        assert!(matches!(
            data.tag_scope_attribute("k", "v"),
            Err(BufferError::Finalized { .. })
        ));
        assert!(data.finalize().is_err());

        let err = data.finalize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Trace buffer for trace ID 00000000000000000000000000000002 was already finalized."
        );
    }

    #[test]
    fn lock_survives_panicking_reader() {
        let trace_id = TraceId::from(3u128);
        let data = TraceData::new(trace_id);
        data.append(batch(trace_id, 1, 1)).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| data.with_batches(|_| panic!("predicate failure"))));
        assert!(result.is_err());

        data.append(batch(trace_id, 1, 1)).unwrap();
        assert_eq!(data.batch_count(), 2);
    }
}
