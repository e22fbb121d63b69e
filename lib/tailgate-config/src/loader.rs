use std::path::Path;

use figment::{
    providers::{Env, Serialized},
    Figment, Metadata, Profile, Provider,
};
use serde::Deserialize;
use tracing::debug;

use crate::{provider::ResolvedProvider, ConfigurationError, EnvironmentPrefixes, GenericConfiguration};

struct Source(Box<dyn Provider + Send + Sync>);

impl Provider for Source {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<figment::value::Map<Profile, figment::value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// Builds a configuration from layered sources.
///
/// Each source is layered over the ones added before it, so a setting in a later source replaces the same setting
/// in an earlier one. Files are read when they are added, not when the configuration is queried.
///
/// Sources can be YAML files, JSON files, or environment variables sharing a prefix (see
/// [`from_environment`][Self::from_environment]).
#[derive(Default)]
pub struct ConfigurationLoader {
    sources: Vec<Source>,
    prefixes: EnvironmentPrefixes,
}

impl ConfigurationLoader {
    /// Adds a YAML file as a source.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or is not valid YAML, an error is returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        self.sources.push(Source(Box::new(ResolvedProvider::from_yaml(path)?)));
        Ok(self)
    }

    /// Adds a YAML file as a source, if it can be loaded.
    ///
    /// A file that is missing, unreadable, or not valid YAML is skipped.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match ResolvedProvider::from_yaml(path) {
            Ok(provider) => self.sources.push(Source(Box::new(provider))),
            Err(e) => debug!(error = %e, file_path = %path.display(), "Skipping unreadable YAML configuration file."),
        }
        self
    }

    /// Adds a JSON file as a source.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or is not valid JSON, an error is returned.
    pub fn from_json<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        self.sources.push(Source(Box::new(ResolvedProvider::from_json(path)?)));
        Ok(self)
    }

    /// Adds the environment variables starting with `prefix` as a source.
    ///
    /// The prefix is matched case-insensitively, and an underscore separator is added if it is missing: `tailgate`
    /// matches `TAILGATE_LOG_LEVEL`, which sets `log_level`. Variables are captured when this is called.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error is returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let mut prefix = prefix.to_uppercase();
        if !prefix.ends_with('_') {
            prefix.push('_');
        }

        let mut captured = Env::prefixed(&prefix).data()?;
        if let Some(values) = captured.remove(&Profile::Default) {
            self.sources.push(Source(Box::new(Serialized::defaults(values))));
            self.prefixes.insert(prefix);
        }
        Ok(self)
    }

    fn merged(&self) -> Figment {
        self.sources
            .iter()
            .fold(Figment::new(), |figment, source| figment.admerge(source))
    }

    /// Deserializes the merged configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the merged configuration cannot be deserialized as `T`, an error is returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.merged()
            .extract()
            .map_err(|e| ConfigurationError::from_figment(&self.prefixes, e))
    }

    /// Merges every source into a [`GenericConfiguration`] that can be queried by key.
    pub fn into_generic(self) -> GenericConfiguration {
        GenericConfiguration::new(self.merged(), self.prefixes)
    }
}
