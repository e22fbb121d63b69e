//! In-memory trace data model.
//!
//! Traces arrive as batches: each batch ([`ResourceSpans`]) carries one [`Resource`] describing the producing entity,
//! and one or more scope span groups ([`ScopeSpans`]), each owning an ordered sequence of [`Span`]s. A [`Traces`]
//! value is an ordered list of such batches, and may hold spans from many different traces until it is split apart
//! with [`Traces::group_by_trace_id`].
#![deny(missing_docs)]

mod attributes;
pub use self::attributes::{AttributeMap, AttributeValue};

mod ids;
pub use self::ids::{InvalidIdentifier, SpanId, TraceId};

mod traces;
pub use self::traces::{
    InstrumentationScope, Resource, ResourceSpans, ScopeSpans, Span, SpanKind, Status, StatusCode, Traces,
};
