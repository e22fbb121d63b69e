//! Layered configuration loading and typed lookups.
//!
//! A [`ConfigurationLoader`] stacks YAML files, JSON files, and prefixed environment variables, and produces either a
//! typed value or a [`GenericConfiguration`] that can be queried one key at a time.
#![deny(missing_docs)]

use std::collections::BTreeSet;

mod error;
pub use self::error::ConfigurationError;

mod generic;
pub use self::generic::GenericConfiguration;

mod loader;
pub use self::loader::ConfigurationLoader;

mod provider;

/// Environment variable prefixes that were loaded, each uppercased with a trailing underscore.
#[derive(Clone, Debug, Default)]
pub(crate) struct EnvironmentPrefixes(BTreeSet<String>);

impl EnvironmentPrefixes {
    fn insert(&mut self, prefix: String) {
        self.0.insert(prefix);
    }

    /// Returns the environment variable that would set `key` under each loaded prefix.
    fn env_var_names<'a>(&'a self, key: &'a str) -> impl Iterator<Item = String> + 'a {
        self.0
            .iter()
            .map(move |prefix| format!("{}{}", prefix, key.replace('.', "_").to_uppercase()))
    }
}
