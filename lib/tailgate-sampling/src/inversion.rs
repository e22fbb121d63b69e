/// Inversion mode.
///
/// Selects which decision tags inverted ("sample only if the predicate holds everywhere") composition produces. The
/// mode never changes whether a trace is kept or dropped, only whether the decision is reported as
/// `Sampled`/`NotSampled` or as `InvertSampled`/`InvertNotSampled`.
///
/// The mode is established once at startup and handed to the [`DecisionCombinator`][crate::DecisionCombinator] when
/// it is constructed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InversionMode {
    /// Inverted composition produces `Sampled` and `NotSampled`.
    #[default]
    Disabled,

    /// Inverted composition produces `InvertSampled` and `InvertNotSampled`.
    ///
    /// This preserves the decision tags of deployments that predate the disabled mode.
    Enabled,
}

impl InversionMode {
    /// Creates an `InversionMode` from the `disable_invert_decisions` setting.
    pub const fn from_disable_flag(disable_invert_decisions: bool) -> Self {
        if disable_invert_decisions {
            Self::Disabled
        } else {
            Self::Enabled
        }
    }

    /// Returns `true` if inverted decision tags are disabled.
    pub const fn is_inversion_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}
