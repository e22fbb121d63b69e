use std::borrow::Cow;

use figment::error::Kind;
use snafu::Snafu;

use crate::EnvironmentPrefixes;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// The environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// A required setting was not present in any source.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// How to provide the setting, including its environment variable spelling when environment variables were
        /// loaded.
        help_text: String,

        /// Key of the missing setting.
        field: Cow<'static, str>,
    },

    /// A setting was present, but had the wrong type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated key of the setting.
        field: String,

        /// Type that was expected.
        expected_ty: String,

        /// Type that was found.
        actual_ty: String,
    },

    /// Any other error raised while loading or extracting configuration.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Underlying error.
        source: figment::Error,
    },
}

impl ConfigurationError {
    pub(crate) fn from_figment(prefixes: &EnvironmentPrefixes, e: figment::Error) -> Self {
        match e.kind {
            Kind::MissingField(field) => {
                let mut spellings = vec![format!("`{}`", field)];
                spellings.extend(prefixes.env_var_names(&field).map(|name| format!("`{}`", name)));

                Self::MissingField {
                    help_text: format!("Try setting {}.", spellings.join(" or ")),
                    field,
                }
            }
            Kind::InvalidType(actual, expected) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty: expected,
                actual_ty: actual.to_string(),
            },
            _ => Self::Generic { source: e },
        }
    }
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        Self::from_figment(&EnvironmentPrefixes::default(), e)
    }
}
