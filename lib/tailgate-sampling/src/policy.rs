//! Sampling policies.

use ahash::HashSet;
use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};
use tailgate_data::{AttributeMap, Resource, Span, StatusCode};

use crate::{Decision, DecisionCombinator, SamplingPredicate, TraceData};

/// A policy configuration error.
#[derive(Debug, Eq, PartialEq, Snafu)]
#[snafu(context(suffix(false)))]
pub enum PolicyError {
    /// The attribute key was empty.
    #[snafu(display("Policy '{}' has an empty attribute key.", policy))]
    EmptyKey {
        /// Name of the policy.
        policy: String,
    },

    /// No attribute values were given.
    #[snafu(display("Policy '{}' must list at least one attribute value.", policy))]
    EmptyValues {
        /// Name of the policy.
        policy: String,
    },

    /// No status codes were given.
    #[snafu(display("Policy '{}' must list at least one status code.", policy))]
    EmptyStatusCodes {
        /// Name of the policy.
        policy: String,
    },
}

/// A sampling policy.
///
/// Policies supply predicates and pick a composition strategy, while the [`DecisionCombinator`] owns the traversal.
pub trait SamplingPolicy: Send + Sync {
    /// Returns the name of the policy.
    fn name(&self) -> &str;

    /// Evaluates the policy against a buffered trace.
    fn evaluate(&self, combinator: &DecisionCombinator, trace: &TraceData) -> Decision;
}

/// Matches resources and spans by the value of a string attribute.
#[derive(Clone, Debug)]
struct AttributeValueMatcher {
    key: String,
    values: HashSet<String>,
}

impl AttributeValueMatcher {
    fn matches(&self, attributes: &AttributeMap) -> bool {
        attributes
            .get_str(&self.key)
            .is_some_and(|value| self.values.contains(value))
    }
}

impl SamplingPredicate for AttributeValueMatcher {
    fn matches_resource(&self, resource: &Resource) -> bool {
        self.matches(resource.attributes())
    }

    fn matches_span(&self, span: &Span) -> bool {
        self.matches(span.attributes())
    }
}

/// Samples traces based on a string attribute of their resources or spans.
///
/// By default, a trace is sampled if any resource or span has the attribute set to one of the listed values. With
/// `invert_match`, a trace is sampled only if no resource or span has the attribute set to a listed value.
#[derive(Clone, Debug)]
pub struct StringAttributeFilter {
    name: String,
    matcher: AttributeValueMatcher,
    invert_match: bool,
}

impl StringAttributeFilter {
    /// Creates a new `StringAttributeFilter`.
    ///
    /// # Errors
    ///
    /// If `key` is empty, or `values` is empty, an error is returned.
    pub fn new<I, V>(
        name: impl Into<String>, key: impl Into<String>, values: I, invert_match: bool,
    ) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        let key = key.into();
        let values = values.into_iter().map(Into::into).collect::<HashSet<String>>();

        ensure!(!key.is_empty(), EmptyKey { policy: name });
        ensure!(!values.is_empty(), EmptyValues { policy: name });

        Ok(Self {
            name,
            matcher: AttributeValueMatcher { key, values },
            invert_match,
        })
    }
}

impl SamplingPolicy for StringAttributeFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, combinator: &DecisionCombinator, trace: &TraceData) -> Decision {
        if self.invert_match {
            combinator.and_across_trace(trace, &(&self.matcher).negate())
        } else {
            combinator.or_across_trace(trace, &self.matcher)
        }
    }
}

#[derive(Clone, Debug)]
struct StatusCodeMatcher {
    status_codes: HashSet<StatusCode>,
}

impl SamplingPredicate for StatusCodeMatcher {
    fn matches_resource(&self, _: &Resource) -> bool {
        false
    }

    fn matches_span(&self, span: &Span) -> bool {
        self.status_codes.contains(&span.status().code())
    }
}

/// Samples traces with at least one span whose status code is listed.
#[derive(Clone, Debug)]
pub struct StatusCodeFilter {
    name: String,
    matcher: StatusCodeMatcher,
}

impl StatusCodeFilter {
    /// Creates a new `StatusCodeFilter`.
    ///
    /// # Errors
    ///
    /// If `status_codes` is empty, an error is returned.
    pub fn new<I>(name: impl Into<String>, status_codes: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = StatusCode>,
    {
        let name = name.into();
        let status_codes = status_codes.into_iter().collect::<HashSet<_>>();
        ensure!(!status_codes.is_empty(), EmptyStatusCodes { policy: name });

        Ok(Self {
            name,
            matcher: StatusCodeMatcher { status_codes },
        })
    }
}

impl SamplingPolicy for StatusCodeFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, combinator: &DecisionCombinator, trace: &TraceData) -> Decision {
        combinator.or_across_spans_only(trace, &self.matcher)
    }
}

/// Configuration for a single sampling policy.
///
/// Deserialized from a map with a `type` field selecting the kind of policy:
///
/// ```yaml
/// - type: string_attribute
///   name: checkout-only
///   key: service.name
///   values: [checkout]
/// - type: status_code
///   name: errors
///   status_codes: [error]
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfiguration {
    /// A [`StringAttributeFilter`].
    StringAttribute {
        /// Name of the policy.
        name: String,

        /// Attribute key to look up.
        key: String,

        /// Attribute values that match.
        values: Vec<String>,

        /// Whether to sample only traces where nothing matches.
        #[serde(default)]
        invert_match: bool,
    },

    /// A [`StatusCodeFilter`].
    StatusCode {
        /// Name of the policy.
        name: String,

        /// Span status codes that match.
        status_codes: Vec<StatusCode>,
    },
}

impl PolicyConfiguration {
    /// Returns the name of the configured policy.
    pub fn name(&self) -> &str {
        match self {
            Self::StringAttribute { name, .. } | Self::StatusCode { name, .. } => name,
        }
    }

    /// Builds the configured policy.
    ///
    /// # Errors
    ///
    /// If the configuration is not valid for its kind of policy, an error is returned.
    pub fn build(&self) -> Result<Box<dyn SamplingPolicy>, PolicyError> {
        let policy: Box<dyn SamplingPolicy> = match self {
            Self::StringAttribute {
                name,
                key,
                values,
                invert_match,
            } => Box::new(StringAttributeFilter::new(
                name.clone(),
                key.clone(),
                values.iter().cloned(),
                *invert_match,
            )?),
            Self::StatusCode { name, status_codes } => {
                Box::new(StatusCodeFilter::new(name.clone(), status_codes.iter().copied())?)
            }
        };
        Ok(policy)
    }
}
