use tailgate_config::{ConfigurationError, GenericConfiguration};

use crate::{DecisionCombinator, InversionMode, PolicyConfiguration, PolicyError, SamplingPolicy};

const DISABLE_INVERT_DECISIONS_KEY: &str = "tail_sampling.disable_invert_decisions";
const POLICIES_KEY: &str = "tail_sampling.policies";

/// Tail sampling configuration.
#[derive(Clone, Debug, Default)]
pub struct SamplingConfiguration {
    inversion_mode: InversionMode,
    policies: Vec<PolicyConfiguration>,
}

impl SamplingConfiguration {
    /// Creates a new `SamplingConfiguration` from the given configuration.
    ///
    /// Inverted decision tags are disabled unless `tail_sampling.disable_invert_decisions` is set to `false`, and no
    /// policies are configured unless `tail_sampling.policies` is set.
    ///
    /// # Errors
    ///
    /// If either setting is present but cannot be deserialized, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, ConfigurationError> {
        let disable_invert_decisions = config
            .try_get_typed::<bool>(DISABLE_INVERT_DECISIONS_KEY)?
            .unwrap_or(true);
        let policies = config
            .try_get_typed::<Vec<PolicyConfiguration>>(POLICIES_KEY)?
            .unwrap_or_default();

        Ok(Self {
            inversion_mode: InversionMode::from_disable_flag(disable_invert_decisions),
            policies,
        })
    }

    /// Returns the inversion mode.
    pub fn inversion_mode(&self) -> InversionMode {
        self.inversion_mode
    }

    /// Returns the configured policies.
    pub fn policies(&self) -> &[PolicyConfiguration] {
        &self.policies
    }

    /// Creates a decision combinator using the configured inversion mode.
    pub fn combinator(&self) -> DecisionCombinator {
        DecisionCombinator::new(self.inversion_mode)
    }

    /// Builds every configured policy, in configuration order.
    ///
    /// # Errors
    ///
    /// If any policy is invalid, an error is returned.
    pub fn build_policies(&self) -> Result<Vec<Box<dyn SamplingPolicy>>, PolicyError> {
        self.policies.iter().map(PolicyConfiguration::build).collect()
    }
}
