//! Layered configuration loading.
//!
//! Configuration is assembled from an optional YAML file and from prefixed environment variables, with later sources
//! taking precedence over earlier ones, and then deserialized into a typed structure.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{borrow::Cow, path::Path};

use figment::{
    error::Kind,
    providers::{Env, Format as _, Yaml},
    Figment,
};
use serde::de::DeserializeOwned;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;
use tusk_error::GenericError;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Configuration file could not be read.
    #[snafu(display("Failed to read configuration file '{}': {}", path, source))]
    UnreadableFile {
        /// Path to the configuration file.
        path: String,

        /// Error source.
        source: std::io::Error,
    },

    /// A required field was missing.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Hint describing how the field can be set.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// A field had a value of the wrong type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Any other configuration error.
    #[snafu(display("Failed to load configuration."))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

/// A configuration loader that can pull from a YAML file and from the environment.
///
/// Sources are merged in the order they are added: values from sources added later override values from sources
/// added earlier.
#[derive(Default)]
pub struct ConfigurationLoader {
    figment: Figment,
    env_prefix: Option<String>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, an error is returned. Syntax errors in the file surface when the configuration is
    /// deserialized.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let contents = read_config_file(path.as_ref())?;
        self.figment = self.figment.merge(Yaml::string(&contents));
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring it if it cannot be read.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        match read_config_file(path) {
            Ok(contents) => self.figment = self.figment.merge(Yaml::string(&contents)),
            Err(e) => {
                debug!(error = %e, file_path = %path.display(), "Unable to read YAML configuration file. Ignoring.");
            }
        }
        self
    }

    /// Loads configuration from environment variables starting with the given prefix.
    ///
    /// An underscore is appended to the prefix if it does not already end with one, so a prefix of `tusk` matches
    /// `TUSK_ANTLR_JAR` as the key `antlr_jar`. Matching is case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error is returned.
    pub fn from_environment(mut self, prefix: &str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_uppercase()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        self.figment = self.figment.merge(Env::prefixed(&prefix));
        self.env_prefix = Some(prefix);
        Ok(self)
    }

    /// Consumes the loader, deserializing the merged configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be deserialized into `T`, an error is returned.
    pub fn into_typed<T>(self) -> Result<T, ConfigurationError>
    where
        T: DeserializeOwned,
    {
        self.figment
            .extract()
            .map_err(|e| from_figment_error(self.env_prefix.as_deref(), e))
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigurationError> {
    std::fs::read_to_string(path).context(UnreadableFile {
        path: path.display().to_string(),
    })
}

fn from_figment_error(env_prefix: Option<&str>, e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let help_text = match env_prefix {
                Some(prefix) => format!("Try setting `{}` or `{}{}`.", field, prefix, field.to_uppercase()),
                None => format!("Try setting `{}`.", field),
            };
            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty,
            actual_ty: actual_ty.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        antlr_jar: String,
        #[serde(default)]
        retain_sessions: bool,
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("tusk.yaml", "antlr_jar: /opt/file.jar\nretain_sessions: true\n")?;
            jail.set_env("TUSK_ANTLR_JAR", "/opt/env.jar");

            let sample: Sample = ConfigurationLoader::default()
                .from_yaml("tusk.yaml")
                .and_then(|loader| loader.from_environment("tusk"))
                .and_then(|loader| loader.into_typed())
                .map_err(|e| e.to_string())?;

            assert_eq!(sample.antlr_jar, "/opt/env.jar");
            assert!(sample.retain_sessions);
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_ignored_when_optional() {
        Jail::expect_with(|jail| {
            jail.set_env("TUSK_ANTLR_JAR", "/opt/env.jar");

            let sample: Sample = ConfigurationLoader::default()
                .try_from_yaml("does-not-exist.yaml")
                .from_environment("TUSK_")
                .and_then(|loader| loader.into_typed())
                .map_err(|e| e.to_string())?;

            assert_eq!(sample.antlr_jar, "/opt/env.jar");
            assert!(!sample.retain_sessions);
            Ok(())
        });
    }

    #[test]
    fn missing_field_mentions_environment_variable() {
        Jail::expect_with(|_| {
            let err = ConfigurationLoader::default()
                .from_environment("tusk")
                .and_then(|loader| loader.into_typed::<Sample>())
                .unwrap_err();

            match err {
                ConfigurationError::MissingField { field, help_text } => {
                    assert_eq!(field, "antlr_jar");
                    assert!(help_text.contains("TUSK_ANTLR_JAR"));
                }
                other => panic!("unexpected error: {}", other),
            }
            Ok(())
        });
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(matches!(
            ConfigurationLoader::default().from_environment(""),
            Err(ConfigurationError::EmptyPrefix)
        ));
    }
}
