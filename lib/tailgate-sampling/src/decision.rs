use std::fmt;

/// A sampling decision for a single policy evaluation.
///
/// `Sampled` and `NotSampled` come from direct composition ("something qualified the trace"), while `InvertSampled`
/// and `InvertNotSampled` come from inverted composition under legacy semantics ("nothing disqualified the trace").
/// Both pairs carry the same keep/drop meaning, but are kept distinct so that the layer combining decisions across
/// policies can treat them differently.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Decision {
    /// The trace should be kept.
    Sampled,

    /// The trace should not be kept.
    NotSampled,

    /// The trace should be kept, as decided by inverted composition.
    InvertSampled,

    /// The trace should not be kept, as decided by inverted composition.
    InvertNotSampled,
}

impl Decision {
    /// Returns `true` if this decision asks for the trace to be kept.
    pub const fn is_sampled(&self) -> bool {
        matches!(self, Self::Sampled | Self::InvertSampled)
    }

    /// Returns `true` if this decision came from inverted composition under legacy semantics.
    pub const fn is_inverted(&self) -> bool {
        matches!(self, Self::InvertSampled | Self::InvertNotSampled)
    }

    /// Returns a stable, human-readable label for this decision.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sampled => "sampled",
            Self::NotSampled => "not_sampled",
            Self::InvertSampled => "invert_sampled",
            Self::InvertNotSampled => "invert_not_sampled",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
