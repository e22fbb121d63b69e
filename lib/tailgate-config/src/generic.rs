use std::sync::Arc;

use figment::{error::Kind, Figment};
use serde::Deserialize;

use crate::{ConfigurationError, EnvironmentPrefixes};

#[derive(Debug)]
struct Inner {
    figment: Figment,
    prefixes: EnvironmentPrefixes,
}

/// Merged configuration, queried by key.
///
/// Keys use periods for nesting. Given this YAML:
///
/// ```yaml
/// tail_sampling:
///   disable_invert_decisions: true
/// ```
///
/// `tail_sampling.disable_invert_decisions` resolves to `true`, and `tail_sampling` resolves to the whole map.
///
/// Environment variables cannot express nesting, so a nested key is first looked up with every period replaced by an
/// underscore: `TAILGATE_TAIL_SAMPLING_DISABLE_INVERT_DECISIONS` sets `tail_sampling.disable_invert_decisions`, and
/// takes precedence over the same setting in a file.
///
/// Cloning is cheap, as clones share the underlying data.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    pub(crate) fn new(figment: Figment, prefixes: EnvironmentPrefixes) -> Self {
        Self {
            inner: Arc::new(Inner { figment, prefixes }),
        }
    }

    fn lookup<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        let figment = &self.inner.figment;
        let to_error = |e: figment::Error| ConfigurationError::from_figment(&self.inner.prefixes, e);

        // The flattened spelling only ever comes from environment variables, which outrank files.
        if key.contains('.') {
            match figment.extract_inner(&key.replace('.', "_")) {
                Err(e) if matches!(e.kind, Kind::MissingField(_)) => {}
                result => return result.map_err(to_error),
            }
        }

        figment.extract_inner(key).map_err(to_error)
    }

    /// Gets the value of `key` as `T`.
    ///
    /// # Errors
    ///
    /// If the key is not present, or its value cannot be deserialized as `T`, an error is returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.lookup(key)
    }

    /// Gets the value of `key` as `T`, falling back to `T::default()`.
    ///
    /// The default is used both when the key is absent and when its value cannot be deserialized, so errors are
    /// silently discarded.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.lookup(key).unwrap_or_default()
    }

    /// Gets the value of `key` as `T`, if the key is present.
    ///
    /// # Errors
    ///
    /// If the key is present, but its value cannot be deserialized as `T`, an error is returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.lookup(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deserializes the whole configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be deserialized as `T`, an error is returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract()
            .map_err(|e| ConfigurationError::from_figment(&self.inner.prefixes, e))
    }
}
