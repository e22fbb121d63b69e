use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;
use serde::Serialize;
use tailgate_data::{TraceId, Traces};
use tailgate_sampling::{Decision, DecisionCombinator, SamplingPolicy, TraceBuffers};
use tracing::{debug, info, warn};

/// Scope attribute naming the policy that sampled a trace.
pub const POLICY_ATTRIBUTE_KEY: &str = "tailsampling.policy";

/// Decision made by a single policy for a single trace.
#[derive(Debug, Serialize)]
pub struct PolicyOutcome {
    pub policy: String,
    pub decision: &'static str,
}

/// Evaluation result for a single trace.
#[derive(Debug, Serialize)]
pub struct TraceOutcome {
    pub trace_id: TraceId,
    pub spans: usize,
    pub sampled_by: Option<String>,
    pub decisions: Vec<PolicyOutcome>,
}

/// Evaluates buffered traces against an ordered set of policies.
pub struct Evaluator {
    combinator: DecisionCombinator,
    policies: Vec<Box<dyn SamplingPolicy>>,
    buffers: TraceBuffers,
}

impl Evaluator {
    pub fn new(combinator: DecisionCombinator, policies: Vec<Box<dyn SamplingPolicy>>) -> Self {
        Self {
            combinator,
            policies,
            buffers: TraceBuffers::new(),
        }
    }

    /// Buffers the traces in the given file.
    pub fn ingest_file(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::open(path).with_context(|| format!("Failed to open traces file '{}'.", path.display()))?;
        let traces: Traces = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse traces file '{}'.", path.display()))?;

        let summary = self.buffers.ingest(traces);
        info!(
            new_traces = summary.new_traces,
            spans_buffered = summary.spans_buffered,
            late_spans = summary.late_spans,
            "Ingested traces."
        );
        Ok(())
    }

    /// Evaluates every buffered trace, in arrival order, and flushes it.
    ///
    /// Every policy is evaluated against every trace. Traces sampled by at least one policy are tagged with the name of
    /// the first such policy, and returned alongside the per-trace outcomes.
    pub fn evaluate_all(&self) -> (Vec<TraceOutcome>, Traces) {
        let mut outcomes = Vec::new();
        let mut kept = Traces::default();

        for trace_id in self.buffers.trace_ids() {
            let Some(data) = self.buffers.get(&trace_id) else {
                continue;
            };

            let decisions = self
                .policies
                .iter()
                .map(|policy| (policy.name(), policy.evaluate(&self.combinator, &data)))
                .collect::<Vec<_>>();
            let sampled_by = decisions
                .iter()
                .find(|(_, decision)| decision.is_sampled())
                .map(|(name, _)| name.to_string());

            if let Some(policy) = &sampled_by {
                if let Err(e) = data.tag_scope_attribute(POLICY_ATTRIBUTE_KEY, policy) {
                    warn!(%trace_id, error = %e, "Failed to tag sampled trace.");
                }
            }

            let spans = data.span_count();
            let Some(batches) = self.buffers.evict(&trace_id) else {
                continue;
            };

            match &sampled_by {
                Some(policy) => {
                    info!(%trace_id, spans, policy = policy.as_str(), "Trace sampled.");
                    for batch in batches {
                        kept.append(batch);
                    }
                }
                None => debug!(%trace_id, spans, "Trace not sampled."),
            }

            outcomes.push(TraceOutcome {
                trace_id,
                spans,
                sampled_by,
                decisions: decisions
                    .into_iter()
                    .map(|(name, decision): (&str, Decision)| PolicyOutcome {
                        policy: name.to_string(),
                        decision: decision.as_str(),
                    })
                    .collect(),
            });
        }

        (outcomes, kept)
    }
}
