//! Tail-based sampling decisions.
//!
//! Spans are buffered per trace until a decision is made. Policies supply resource/span predicates, and the
//! [`DecisionCombinator`] folds those predicates over every buffered batch of a trace into a single [`Decision`].
#![deny(missing_docs)]

mod buffer;
pub use self::buffer::{BufferError, TraceData};

mod combinator;
pub use self::combinator::{scan_spans, DecisionCombinator};

mod config;
pub use self::config::SamplingConfiguration;

mod decision;
pub use self::decision::Decision;

mod inversion;
pub use self::inversion::InversionMode;

mod policy;
pub use self::policy::{PolicyConfiguration, PolicyError, SamplingPolicy, StatusCodeFilter, StringAttributeFilter};

mod predicate;
pub use self::predicate::{predicate_fn, FnPredicate, Negate, SamplingPredicate};

mod registry;
pub use self::registry::{IngestSummary, TraceBuffers};

pub mod telemetry;
