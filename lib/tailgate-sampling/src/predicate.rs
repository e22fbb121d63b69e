use std::sync::Arc;

use tailgate_data::{Resource, Span};

/// A resource/span predicate supplied by a sampling policy.
///
/// Predicates are pure boolean functions: anything that prevents a predicate from evaluating, such as a missing
/// attribute or an attribute of the wrong type, must be reported as "does not match" rather than surfaced as an
/// error. Predicates must not assume they are run exhaustively, as evaluation stops as soon as the outcome is known.
pub trait SamplingPredicate {
    /// Returns `true` if the given resource matches.
    fn matches_resource(&self, resource: &Resource) -> bool;

    /// Returns `true` if the given span matches.
    fn matches_span(&self, span: &Span) -> bool;

    /// Returns a predicate that matches exactly when this one does not.
    fn negate(self) -> Negate<Self>
    where
        Self: Sized,
    {
        Negate(self)
    }
}

impl<P> SamplingPredicate for &P
where
    P: SamplingPredicate + ?Sized,
{
    fn matches_resource(&self, resource: &Resource) -> bool {
        (**self).matches_resource(resource)
    }

    fn matches_span(&self, span: &Span) -> bool {
        (**self).matches_span(span)
    }
}

impl<P> SamplingPredicate for Box<P>
where
    P: SamplingPredicate + ?Sized,
{
    fn matches_resource(&self, resource: &Resource) -> bool {
        (**self).matches_resource(resource)
    }

    fn matches_span(&self, span: &Span) -> bool {
        (**self).matches_span(span)
    }
}

impl<P> SamplingPredicate for Arc<P>
where
    P: SamplingPredicate + ?Sized,
{
    fn matches_resource(&self, resource: &Resource) -> bool {
        (**self).matches_resource(resource)
    }

    fn matches_span(&self, span: &Span) -> bool {
        (**self).matches_span(span)
    }
}

/// Logical negation of a predicate.
#[derive(Clone, Debug)]
pub struct Negate<P>(P);

impl<P> Negate<P> {
    /// Returns the wrapped predicate.
    pub fn into_inner(self) -> P {
        self.0
    }
}

impl<P: SamplingPredicate> SamplingPredicate for Negate<P> {
    fn matches_resource(&self, resource: &Resource) -> bool {
        !self.0.matches_resource(resource)
    }

    fn matches_span(&self, span: &Span) -> bool {
        !self.0.matches_span(span)
    }
}

/// A predicate built from a pair of closures.
///
/// Created with [`predicate_fn`].
#[derive(Clone)]
pub struct FnPredicate<R, S> {
    resource_fn: R,
    span_fn: S,
}

impl<R, S> SamplingPredicate for FnPredicate<R, S>
where
    R: Fn(&Resource) -> bool,
    S: Fn(&Span) -> bool,
{
    fn matches_resource(&self, resource: &Resource) -> bool {
        (self.resource_fn)(resource)
    }

    fn matches_span(&self, span: &Span) -> bool {
        (self.span_fn)(span)
    }
}

/// Creates a predicate from a resource closure and a span closure.
pub fn predicate_fn<R, S>(resource_fn: R, span_fn: S) -> FnPredicate<R, S>
where
    R: Fn(&Resource) -> bool,
    S: Fn(&Span) -> bool,
{
    FnPredicate { resource_fn, span_fn }
}
