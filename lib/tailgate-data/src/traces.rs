use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{AttributeMap, SpanId, TraceId};

/// A resource.
///
/// Describes the entity that produced a batch of spans, such as a service running on a specific host.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Resource {
    #[serde(default)]
    attributes: AttributeMap,
}

impl Resource {
    /// Creates a new `Resource` with the given attributes.
    pub fn new(attributes: AttributeMap) -> Self {
        Self { attributes }
    }

    /// Returns the attributes of the resource.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Returns a mutable reference to the attributes of the resource.
    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

/// An instrumentation scope.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct InstrumentationScope {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    attributes: AttributeMap,
}

impl InstrumentationScope {
    /// Creates a new `InstrumentationScope` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the version of the scope.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the attributes of the scope.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_attributes(mut self, attributes: AttributeMap) -> Self {
        self.attributes = attributes;
        self
    }

    /// Returns the name of the scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the version of the scope.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the attributes of the scope.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Returns a mutable reference to the attributes of the scope.
    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

/// Span kind.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Unspecified.
    #[default]
    Unspecified,

    /// An internal operation within an application.
    Internal,

    /// The server side of a synchronous remote call.
    Server,

    /// The client side of a synchronous remote call.
    Client,

    /// The producer side of an asynchronous message.
    Producer,

    /// The consumer side of an asynchronous message.
    Consumer,
}

/// Span status code.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// No status was set.
    #[default]
    Unset,

    /// The operation completed successfully.
    Ok,

    /// The operation failed.
    Error,
}

/// Span status.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Status {
    #[serde(default)]
    code: StatusCode,
    #[serde(default)]
    message: String,
}

impl Status {
    /// Creates a new `Status` with the given code and message.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the status code.
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// Returns the status message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A span.
///
/// A single unit of work within a trace.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Span {
    trace_id: TraceId,
    span_id: SpanId,
    #[serde(default)]
    parent_span_id: SpanId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: SpanKind,
    #[serde(default)]
    start_time_unix_nano: u64,
    #[serde(default)]
    end_time_unix_nano: u64,
    #[serde(default)]
    attributes: AttributeMap,
    #[serde(default)]
    status: Status,
}

impl Span {
    /// Creates a new `Span`.
    pub fn new(trace_id: TraceId, span_id: SpanId, name: impl Into<String>) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: SpanId::default(),
            name: name.into(),
            kind: SpanKind::default(),
            start_time_unix_nano: 0,
            end_time_unix_nano: 0,
            attributes: AttributeMap::default(),
            status: Status::default(),
        }
    }

    /// Sets the parent span ID.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_parent_span_id(mut self, parent_span_id: SpanId) -> Self {
        self.parent_span_id = parent_span_id;
        self
    }

    /// Sets the span kind.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the start and end timestamps, in nanoseconds since the Unix epoch.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_timing(mut self, start_time_unix_nano: u64, end_time_unix_nano: u64) -> Self {
        self.start_time_unix_nano = start_time_unix_nano;
        self.end_time_unix_nano = end_time_unix_nano;
        self
    }

    /// Sets the attributes.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_attributes(mut self, attributes: AttributeMap) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the status.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Returns the trace ID.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Returns the span ID.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Returns the parent span ID.
    ///
    /// Root spans have an empty parent span ID.
    pub fn parent_span_id(&self) -> SpanId {
        self.parent_span_id
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the span kind.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the start timestamp, in nanoseconds since the Unix epoch.
    pub fn start_time_unix_nano(&self) -> u64 {
        self.start_time_unix_nano
    }

    /// Returns the end timestamp, in nanoseconds since the Unix epoch.
    pub fn end_time_unix_nano(&self) -> u64 {
        self.end_time_unix_nano
    }

    /// Returns the attributes.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Returns the status.
    pub fn status(&self) -> &Status {
        &self.status
    }
}

/// A scope span group.
///
/// Spans produced by a single instrumentation scope within one arrival batch.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ScopeSpans {
    #[serde(default)]
    scope: InstrumentationScope,
    #[serde(default)]
    spans: Vec<Span>,
}

impl ScopeSpans {
    /// Creates a new `ScopeSpans` for the given scope and spans.
    pub fn new(scope: InstrumentationScope, spans: Vec<Span>) -> Self {
        Self { scope, spans }
    }

    /// Returns the instrumentation scope.
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// Returns a mutable reference to the instrumentation scope.
    pub fn scope_mut(&mut self) -> &mut InstrumentationScope {
        &mut self.scope
    }

    /// Returns the spans, in arrival order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }
}

/// An arrival batch.
///
/// One resource plus the scope span groups it produced.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ResourceSpans {
    #[serde(default)]
    resource: Resource,
    #[serde(default)]
    scope_spans: Vec<ScopeSpans>,
}

impl ResourceSpans {
    /// Creates a new `ResourceSpans` for the given resource and scope span groups.
    pub fn new(resource: Resource, scope_spans: Vec<ScopeSpans>) -> Self {
        Self { resource, scope_spans }
    }

    /// Returns the resource.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Returns the scope span groups, in arrival order.
    pub fn scope_spans(&self) -> &[ScopeSpans] {
        &self.scope_spans
    }

    /// Returns a mutable reference to the scope span groups.
    pub fn scope_spans_mut(&mut self) -> &mut [ScopeSpans] {
        &mut self.scope_spans
    }

    /// Returns an iterator over every span in the batch, in scope order and then span order.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.scope_spans.iter().flat_map(|ss| ss.spans.iter())
    }

    /// Returns the number of spans in the batch.
    pub fn span_count(&self) -> usize {
        self.scope_spans.iter().map(|ss| ss.spans.len()).sum()
    }
}

/// An ordered collection of arrival batches.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Traces {
    #[serde(default)]
    resource_spans: Vec<ResourceSpans>,
}

impl Traces {
    /// Creates a new `Traces` from the given batches.
    pub fn new(resource_spans: Vec<ResourceSpans>) -> Self {
        Self { resource_spans }
    }

    /// Returns the batches, in arrival order.
    pub fn resource_spans(&self) -> &[ResourceSpans] {
        &self.resource_spans
    }

    /// Returns a mutable reference to the batches.
    pub fn resource_spans_mut(&mut self) -> &mut [ResourceSpans] {
        &mut self.resource_spans
    }

    /// Appends a batch.
    pub fn append(&mut self, batch: ResourceSpans) {
        self.resource_spans.push(batch);
    }

    /// Returns `true` if there are no batches.
    pub fn is_empty(&self) -> bool {
        self.resource_spans.is_empty()
    }

    /// Returns the total number of spans across all batches.
    pub fn span_count(&self) -> usize {
        self.resource_spans.iter().map(ResourceSpans::span_count).sum()
    }

    /// Splits the batches by trace ID.
    ///
    /// Each returned entry holds only the spans of a single trace, still grouped under copies of the resource and
    /// scope they arrived with. Trace IDs are returned in the order they were first seen, and the relative order of
    /// batches, scopes, and spans is preserved. Resources and scopes without any spans are dropped.
    pub fn group_by_trace_id(self) -> Vec<(TraceId, Traces)> {
        let mut grouped: IndexMap<TraceId, Traces> = IndexMap::new();

        for rs in self.resource_spans {
            let ResourceSpans { resource, scope_spans } = rs;
            let mut per_batch: IndexMap<TraceId, Vec<ScopeSpans>> = IndexMap::new();

            for ss in scope_spans {
                let ScopeSpans { scope, spans } = ss;
                let mut per_scope: IndexMap<TraceId, Vec<Span>> = IndexMap::new();
                for span in spans {
                    per_scope.entry(span.trace_id).or_default().push(span);
                }

                for (trace_id, spans) in per_scope {
                    per_batch
                        .entry(trace_id)
                        .or_default()
                        .push(ScopeSpans::new(scope.clone(), spans));
                }
            }

            for (trace_id, scope_spans) in per_batch {
                grouped
                    .entry(trace_id)
                    .or_default()
                    .append(ResourceSpans::new(resource.clone(), scope_spans));
            }
        }

        grouped.into_iter().collect()
    }
}

impl From<ResourceSpans> for Traces {
    fn from(batch: ResourceSpans) -> Self {
        Self::new(vec![batch])
    }
}

impl IntoIterator for Traces {
    type Item = ResourceSpans;
    type IntoIter = std::vec::IntoIter<ResourceSpans>;

    fn into_iter(self) -> Self::IntoIter {
        self.resource_spans.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn span(trace: u128, id: u64) -> Span {
        Span::new(TraceId::from(trace), SpanId::from(id), format!("op-{}", id))
    }

    fn resource(service: &str) -> Resource {
        Resource::new(AttributeMap::new().with("service.name", service))
    }

    #[test]
    fn span_counts() {
        let traces = Traces::new(vec![
            ResourceSpans::new(
                resource("a"),
                vec![
                    ScopeSpans::new(InstrumentationScope::new("s1"), vec![span(1, 1), span(1, 2)]),
                    ScopeSpans::new(InstrumentationScope::new("s2"), vec![span(1, 3)]),
                ],
            ),
            ResourceSpans::new(resource("b"), vec![]),
        ]);

        assert_eq!(traces.span_count(), 3);
        assert_eq!(traces.resource_spans()[0].span_count(), 3);
        assert_eq!(traces.resource_spans()[1].span_count(), 0);

        let names = traces.resource_spans()[0].spans().map(Span::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["op-1", "op-2", "op-3"]);
    }

    #[test]
    fn group_by_trace_id_preserves_context_and_order() {
        let scope = InstrumentationScope::new("lib").with_version("1.0");
        let traces = Traces::new(vec![
            ResourceSpans::new(
                resource("frontend"),
                vec![ScopeSpans::new(scope.clone(), vec![span(2, 1), span(1, 2), span(2, 3)])],
            ),
            ResourceSpans::new(
                resource("backend"),
                vec![ScopeSpans::new(scope.clone(), vec![span(1, 4)])],
            ),
        ]);

        let grouped = traces.group_by_trace_id();
        assert_eq!(grouped.len(), 2);

        let (first_id, first) = &grouped[0];
        assert_eq!(*first_id, TraceId::from(2u128));
        assert_eq!(
            *first,
            Traces::from(ResourceSpans::new(
                resource("frontend"),
                vec![ScopeSpans::new(scope.clone(), vec![span(2, 1), span(2, 3)])],
            ))
        );

        let (second_id, second) = &grouped[1];
        assert_eq!(*second_id, TraceId::from(1u128));
        assert_eq!(
            *second,
            Traces::new(vec![
                ResourceSpans::new(resource("frontend"), vec![ScopeSpans::new(scope.clone(), vec![span(1, 2)])]),
                ResourceSpans::new(resource("backend"), vec![ScopeSpans::new(scope, vec![span(1, 4)])]),
            ])
        );
    }

    #[test]
    fn span_builder() {
        let span = span(7, 2)
            .with_parent_span_id(SpanId::from(1u64))
            .with_kind(SpanKind::Client)
            .with_timing(1_000, 1_500)
            .with_attributes(AttributeMap::new().with("http.method", "GET"))
            .with_status(Status::new(StatusCode::Error, "upstream timed out"));

        assert_eq!(span.parent_span_id(), SpanId::from(1u64));
        assert_eq!(span.kind(), SpanKind::Client);
        assert_eq!(span.start_time_unix_nano(), 1_000);
        assert_eq!(span.end_time_unix_nano(), 1_500);
        assert_eq!(span.attributes().get_str("http.method"), Some("GET"));
        assert_eq!(span.status().code(), StatusCode::Error);
        assert_eq!(span.status().message(), "upstream timed out");

        let scope = InstrumentationScope::new("grpc").with_version("2.3.0");
        assert_eq!(scope.name(), "grpc");
        assert_eq!(scope.version(), "2.3.0");
        assert_eq!(InstrumentationScope::new("bare").version(), "");
    }

    #[test]
    fn group_by_trace_id_drops_empty_groups() {
        let traces = Traces::new(vec![ResourceSpans::new(
            resource("idle"),
            vec![ScopeSpans::new(InstrumentationScope::new("empty"), vec![])],
        )]);

        assert!(traces.group_by_trace_id().is_empty());
    }

    #[test]
    fn deserializes_from_json() {
        let raw = r#"{
            "resource_spans": [{
                "resource": { "attributes": { "service.name": "checkout" } },
                "scope_spans": [{
                    "scope": { "name": "http" },
                    "spans": [{
                        "trace_id": "000000000000000000000000000000ff",
                        "span_id": "0000000000000001",
                        "name": "GET /cart",
                        "kind": "server",
                        "status": { "code": "error" }
                    }]
                }]
            }]
        }"#;

        let traces: Traces = serde_json::from_str(raw).unwrap();
        let batch = &traces.resource_spans()[0];
        assert_eq!(batch.resource().attributes().get_str("service.name"), Some("checkout"));

        let span = batch.spans().next().unwrap();
        assert_eq!(span.trace_id(), TraceId::from(0xffu128));
        assert_eq!(span.kind(), SpanKind::Server);
        assert_eq!(span.status().code(), StatusCode::Error);
        assert!(span.parent_span_id().is_empty());
    }
}
