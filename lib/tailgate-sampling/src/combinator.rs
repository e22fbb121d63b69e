//! Decision composition.
//!
//! Folds a policy's predicates over every resource and span of a buffered trace into a single [`Decision`], using
//! either "any match samples" (OR) or "any mismatch drops" (AND) composition. Traversals stop at the first result that
//! determines the outcome: batches and spans after that point are never visited, and predicates are never called on
//! them.

use tailgate_data::{ResourceSpans, Span, Traces};
use tracing::trace;

use crate::{telemetry, Decision, InversionMode, SamplingPredicate, TraceData};

/// Scans every span of a batch, in scope order and then span order.
///
/// For each span, `r = span_predicate(span)` is computed, and `r` is returned as soon as `r != invert`. If every span
/// is exhausted, `invert` is returned.
///
/// With `invert = false`, this answers "does any span match?", returning `true` at the first match. With
/// `invert = true`, this answers "do all spans match?", returning `false` at the first counterexample.
pub fn scan_spans<F>(batch: &ResourceSpans, mut span_predicate: F, invert: bool) -> bool
where
    F: FnMut(&Span) -> bool,
{
    for scope_spans in batch.scope_spans() {
        for span in scope_spans.spans() {
            let r = span_predicate(span);
            if r != invert {
                return r;
            }
        }
    }
    invert
}

/// Decision combinator.
///
/// Evaluates a [`SamplingPredicate`] against a [`TraceData`] buffer. Every traversal holds the buffer lock for its
/// full duration.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecisionCombinator {
    inversion_mode: InversionMode,
}

impl DecisionCombinator {
    /// Creates a new `DecisionCombinator` with the given inversion mode.
    pub const fn new(inversion_mode: InversionMode) -> Self {
        Self { inversion_mode }
    }

    /// Returns the inversion mode.
    pub const fn inversion_mode(&self) -> InversionMode {
        self.inversion_mode
    }

    /// Samples the trace if any resource or any span matches.
    ///
    /// Batches are walked in arrival order. A matching resource samples the trace without looking at any span of that
    /// batch. Otherwise, the batch's spans are scanned, and the first matching span samples the trace. If nothing
    /// matches, including when the buffer is empty, the trace is not sampled.
    pub fn or_across_trace<P>(&self, trace: &TraceData, predicate: &P) -> Decision
    where
        P: SamplingPredicate + ?Sized,
    {
        let decision = trace.with_batches(|traces| or_across_batches(traces, predicate));
        self.record(trace, "or_across_trace", decision)
    }

    /// Samples the trace only if every resource and every span matches.
    ///
    /// Batches are walked in arrival order. A resource that does not match, or a span that does not match, ends the
    /// traversal with a negative decision. If everything matches, including when the buffer is empty, the decision is
    /// positive.
    ///
    /// When inversion is disabled, the decision is `Sampled` or `NotSampled`. When it is enabled, the decision is
    /// `InvertSampled` or `InvertNotSampled`.
    pub fn and_across_trace<P>(&self, trace: &TraceData, predicate: &P) -> Decision
    where
        P: SamplingPredicate + ?Sized,
    {
        let all_match = trace.with_batches(|traces| and_across_batches(traces, predicate));
        let decision = match (all_match, self.inversion_mode.is_inversion_disabled()) {
            (true, true) => Decision::Sampled,
            (true, false) => Decision::InvertSampled,
            (false, true) => Decision::NotSampled,
            (false, false) => Decision::InvertNotSampled,
        };
        self.record(trace, "and_across_trace", decision)
    }

    /// Samples the trace if any span matches.
    ///
    /// Resources are never evaluated. The first matching span, across all batches, samples the trace.
    pub fn or_across_spans_only<P>(&self, trace: &TraceData, predicate: &P) -> Decision
    where
        P: SamplingPredicate + ?Sized,
    {
        let decision = trace.with_batches(|traces| {
            let any_match = traces
                .resource_spans()
                .iter()
                .any(|batch| scan_spans(batch, |span| predicate.matches_span(span), false));
            if any_match {
                Decision::Sampled
            } else {
                Decision::NotSampled
            }
        });
        self.record(trace, "or_across_spans_only", decision)
    }

    fn record(&self, trace: &TraceData, strategy: &'static str, decision: Decision) -> Decision {
        trace!(trace_id = %trace.trace_id(), strategy, decision = decision.as_str(), "Evaluated trace.");
        telemetry::record_decision(strategy, decision);
        decision
    }
}

fn or_across_batches<P>(traces: &Traces, predicate: &P) -> Decision
where
    P: SamplingPredicate + ?Sized,
{
    for batch in traces.resource_spans() {
        if predicate.matches_resource(batch.resource()) {
            return Decision::Sampled;
        }

        if scan_spans(batch, |span| predicate.matches_span(span), false) {
            return Decision::Sampled;
        }
    }
    Decision::NotSampled
}

fn and_across_batches<P>(traces: &Traces, predicate: &P) -> bool
where
    P: SamplingPredicate + ?Sized,
{
    for batch in traces.resource_spans() {
        if !predicate.matches_resource(batch.resource()) {
            return false;
        }

        if !scan_spans(batch, |span| predicate.matches_span(span), true) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use proptest::prelude::*;
    use tailgate_data::{AttributeMap, InstrumentationScope, Resource, ScopeSpans, SpanId, TraceId};

    use super::*;
    use crate::predicate_fn;

    const MATCH_KEY: &str = "match";

    fn span(id: u64, matches: bool) -> Span {
        Span::new(TraceId::from(1u128), SpanId::from(id), format!("span-{}", id))
            .with_attributes(AttributeMap::new().with(MATCH_KEY, matches))
    }

    fn resource(matches: bool) -> Resource {
        Resource::new(AttributeMap::new().with(MATCH_KEY, matches))
    }

    /// Builds a batch whose resource and spans carry a `match` attribute with the given values. Spans are split
    /// across two scopes when there are more than one.
    fn batch(resource_matches: bool, spans: &[bool]) -> ResourceSpans {
        let spans = spans
            .iter()
            .enumerate()
            .map(|(i, m)| span(i as u64 + 1, *m))
            .collect::<Vec<_>>();
        let (first, second) = spans.split_at(spans.len() / 2);
        ResourceSpans::new(
            resource(resource_matches),
            vec![
                ScopeSpans::new(InstrumentationScope::new("first"), first.to_vec()),
                ScopeSpans::new(InstrumentationScope::new("second"), second.to_vec()),
            ],
        )
    }

    fn buffer(batches: Vec<ResourceSpans>) -> TraceData {
        TraceData::from_traces(TraceId::from(1u128), Traces::new(batches))
    }

    fn flag(attributes: &AttributeMap) -> bool {
        attributes
            .get(MATCH_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// A predicate that reads the `match` attribute and counts how often each method is called.
    struct CountingPredicate {
        resource_calls: Cell<usize>,
        span_calls: Cell<usize>,
        seen_spans: std::cell::RefCell<Vec<SpanId>>,
    }

    impl CountingPredicate {
        fn new() -> Self {
            Self {
                resource_calls: Cell::new(0),
                span_calls: Cell::new(0),
                seen_spans: Default::default(),
            }
        }
    }

    impl SamplingPredicate for CountingPredicate {
        fn matches_resource(&self, resource: &Resource) -> bool {
            self.resource_calls.set(self.resource_calls.get() + 1);
            flag(resource.attributes())
        }

        fn matches_span(&self, span: &Span) -> bool {
            self.span_calls.set(self.span_calls.get() + 1);
            self.seen_spans.borrow_mut().push(span.span_id());
            flag(span.attributes())
        }
    }

    fn combinator(mode: InversionMode) -> DecisionCombinator {
        DecisionCombinator::new(mode)
    }

    #[test]
    fn or_resource_match_short_circuits() {
        let trace = buffer(vec![
            batch(false, &[false, false]),
            batch(true, &[true, true]),
            batch(false, &[true]),
        ]);
        let predicate = CountingPredicate::new();

        let decision = combinator(InversionMode::Disabled).or_across_trace(&trace, &predicate);
        assert_eq!(decision, Decision::Sampled);

        // First batch: resource + both spans. Second batch: resource only. Third batch: never visited.
        assert_eq!(predicate.resource_calls.get(), 2);
        assert_eq!(predicate.span_calls.get(), 2);
    }

    #[test]
    fn or_span_match_in_first_batch_skips_later_batches() {
        let trace = buffer(vec![batch(false, &[true]), batch(true, &[true])]);
        let predicate = CountingPredicate::new();

        let decision = combinator(InversionMode::Disabled).or_across_trace(&trace, &predicate);
        assert_eq!(decision, Decision::Sampled);
        assert_eq!(predicate.resource_calls.get(), 1);
        assert_eq!(predicate.span_calls.get(), 1);
    }

    #[test]
    fn or_stops_at_first_matching_span() {
        let trace = buffer(vec![batch(false, &[false, true, true, true])]);
        let predicate = CountingPredicate::new();

        let decision = combinator(InversionMode::Enabled).or_across_trace(&trace, &predicate);
        assert_eq!(decision, Decision::Sampled);
        assert_eq!(*predicate.seen_spans.borrow(), vec![SpanId::from(1u64), SpanId::from(2u64)]);
    }

    #[test]
    fn or_without_any_match_is_not_sampled() {
        let trace = buffer(vec![batch(false, &[false, false]), batch(false, &[false])]);
        let predicate = CountingPredicate::new();

        for mode in [InversionMode::Disabled, InversionMode::Enabled] {
            let decision = combinator(mode).or_across_trace(&trace, &predicate);
            assert_eq!(decision, Decision::NotSampled);
        }
        assert_eq!(predicate.resource_calls.get(), 4);
        assert_eq!(predicate.span_calls.get(), 6);
    }

    #[test]
    fn and_all_match() {
        let trace = buffer(vec![batch(true, &[true, true, true])]);

        let disabled = combinator(InversionMode::Disabled).and_across_trace(&trace, &CountingPredicate::new());
        assert_eq!(disabled, Decision::Sampled);

        let enabled = combinator(InversionMode::Enabled).and_across_trace(&trace, &CountingPredicate::new());
        assert_eq!(enabled, Decision::InvertSampled);
    }

    #[test]
    fn and_span_mismatch() {
        let trace = buffer(vec![batch(true, &[true, false, true])]);

        let predicate = CountingPredicate::new();
        let enabled = combinator(InversionMode::Enabled).and_across_trace(&trace, &predicate);
        assert_eq!(enabled, Decision::InvertNotSampled);
        assert_eq!(*predicate.seen_spans.borrow(), vec![SpanId::from(1u64), SpanId::from(2u64)]);

        let disabled = combinator(InversionMode::Disabled).and_across_trace(&trace, &CountingPredicate::new());
        assert_eq!(disabled, Decision::NotSampled);
    }

    #[test]
    fn and_resource_mismatch_skips_spans_and_later_batches() {
        let trace = buffer(vec![
            batch(true, &[true]),
            batch(false, &[true, true]),
            batch(true, &[true]),
        ]);
        let predicate = CountingPredicate::new();

        let decision = combinator(InversionMode::Disabled).and_across_trace(&trace, &predicate);
        assert_eq!(decision, Decision::NotSampled);
        assert_eq!(predicate.resource_calls.get(), 2);
        assert_eq!(predicate.span_calls.get(), 1);
    }

    #[test]
    fn empty_buffer_outcomes() {
        let trace = buffer(vec![]);
        let never = predicate_fn(|_: &Resource| false, |_: &Span| false);

        let disabled = combinator(InversionMode::Disabled);
        assert_eq!(disabled.or_across_trace(&trace, &never), Decision::NotSampled);
        assert_eq!(disabled.or_across_spans_only(&trace, &never), Decision::NotSampled);
        assert_eq!(disabled.and_across_trace(&trace, &never), Decision::Sampled);

        let enabled = combinator(InversionMode::Enabled);
        assert_eq!(enabled.and_across_trace(&trace, &never), Decision::InvertSampled);
    }

    #[test]
    fn spans_only_ignores_resources() {
        let trace = buffer(vec![batch(true, &[false]), batch(true, &[false, true, false])]);
        let predicate = CountingPredicate::new();

        let decision = combinator(InversionMode::Disabled).or_across_spans_only(&trace, &predicate);
        assert_eq!(decision, Decision::Sampled);
        assert_eq!(predicate.resource_calls.get(), 0);
        assert_eq!(predicate.span_calls.get(), 3);

        let trace = buffer(vec![batch(true, &[false, false])]);
        let decision = combinator(InversionMode::Enabled).or_across_spans_only(&trace, &CountingPredicate::new());
        assert_eq!(decision, Decision::NotSampled);
    }

    #[test]
    fn scan_spans_empty_batch_returns_invert() {
        let empty = batch(true, &[]);
        assert!(!scan_spans(&empty, |_| true, false));
        assert!(scan_spans(&empty, |_| false, true));
    }

    #[test]
    fn scan_spans_crosses_scope_boundaries() {
        // Two spans land in the first scope, two in the second.
        let b = batch(false, &[false, false, false, true]);
        let mut visited = 0;
        assert!(scan_spans(
            &b,
            |s| {
                visited += 1;
                flag(s.attributes())
            },
            false
        ));
        assert_eq!(visited, 4);

        let b = batch(false, &[true, true, true, false]);
        assert!(!scan_spans(&b, |s| flag(s.attributes()), true));
    }

    #[test]
    fn works_with_trait_objects() {
        let trace = buffer(vec![batch(false, &[true])]);
        let predicate: Box<dyn SamplingPredicate> = Box::new(CountingPredicate::new());

        let decision = combinator(InversionMode::Disabled).or_across_trace(&trace, predicate.as_ref());
        assert_eq!(decision, Decision::Sampled);
    }

    fn arb_batches() -> impl Strategy<Value = Vec<(bool, Vec<bool>)>> {
        prop::collection::vec((any::<bool>(), prop::collection::vec(any::<bool>(), 0..6)), 0..5)
    }

    fn build(batches: &[(bool, Vec<bool>)]) -> TraceData {
        buffer(batches.iter().map(|(r, spans)| batch(*r, spans)).collect())
    }

    proptest! {
        #[test]
        fn property_scan_spans_duality(spans in prop::collection::vec(any::<bool>(), 0..12)) {
            let b = batch(false, &spans);
            let any_match = scan_spans(&b, |s| flag(s.attributes()), false);
            let all_negated_match = scan_spans(&b, |s| !flag(s.attributes()), true);

            prop_assert_eq!(any_match, !all_negated_match);
            prop_assert_eq!(any_match, spans.iter().any(|m| *m));
        }

        #[test]
        fn property_or_matches_any(batches in arb_batches()) {
            let trace = build(&batches);
            let predicate = CountingPredicate::new();
            let decision = combinator(InversionMode::Disabled).or_across_trace(&trace, &predicate);

            let expected = batches.iter().any(|(r, spans)| *r || spans.iter().any(|m| *m));
            prop_assert_eq!(decision.is_sampled(), expected);
            prop_assert!(!decision.is_inverted());

            // Batches after the first match are never visited.
            let first_match = batches.iter().position(|(r, spans)| *r || spans.iter().any(|m| *m));
            let visited_batches = first_match.map(|i| i + 1).unwrap_or(batches.len());
            prop_assert_eq!(predicate.resource_calls.get(), visited_batches);
        }

        #[test]
        fn property_and_matches_all(batches in arb_batches(), legacy in any::<bool>()) {
            let mode = if legacy { InversionMode::Enabled } else { InversionMode::Disabled };
            let trace = build(&batches);
            let predicate = CountingPredicate::new();
            let decision = combinator(mode).and_across_trace(&trace, &predicate);

            let expected = batches.iter().all(|(r, spans)| *r && spans.iter().all(|m| *m));
            prop_assert_eq!(decision.is_sampled(), expected);
            prop_assert_eq!(decision.is_inverted(), legacy);

            let first_failure = batches.iter().position(|(r, spans)| !*r || spans.iter().any(|m| !*m));
            let visited_batches = first_failure.map(|i| i + 1).unwrap_or(batches.len());
            prop_assert_eq!(predicate.resource_calls.get(), visited_batches);
        }

        #[test]
        fn property_and_is_dual_of_or(batches in arb_batches()) {
            // AND over a predicate samples exactly when OR over its negation does not.
            let trace = build(&batches);
            let combinator = combinator(InversionMode::Disabled);
            let predicate = predicate_fn(|r: &Resource| flag(r.attributes()), |s: &Span| flag(s.attributes()));

            let and_decision = combinator.and_across_trace(&trace, &predicate);
            let or_negated = combinator.or_across_trace(&trace, &predicate.clone().negate());
            prop_assert_eq!(and_decision.is_sampled(), !or_negated.is_sampled());
        }
    }
}
