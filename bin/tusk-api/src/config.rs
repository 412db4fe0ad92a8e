use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use http::{header, HeaderValue, Method};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tusk_config::ConfigurationLoader;
use tusk_error::{ErrorContext as _, GenericError};
use tusk_grammar::{
    artifact::InterpArtifactLoader,
    compiler::{AntlrCompiler, AntlrConfiguration},
    pipeline::ParsePipeline,
    session::DirectorySessionStore,
};

/// Prefix of the environment variables that override file-based configuration.
const ENV_PREFIX: &str = "TUSK";

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

/// Allowed CORS origins, either as a comma-separated string or as a list.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum OriginList {
    Joined(String),
    Listed(Vec<String>),
}

/// API server configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfiguration {
    /// Address the API server listens on.
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,

    /// Directory under which request sessions are created.
    #[serde(default = "std::env::temp_dir")]
    pub session_root: PathBuf,

    /// Whether session directories are kept after their request completes.
    #[serde(default)]
    pub retain_sessions: bool,

    #[serde(default)]
    cors_allowed_origins: Option<OriginList>,

    #[serde(flatten)]
    pub antlr: AntlrConfiguration,
}

impl ApiConfiguration {
    /// Loads the configuration from the given YAML file, if any, and then from `TUSK_`-prefixed environment
    /// variables.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, or the merged configuration is invalid, an error is returned.
    pub fn load(path: Option<&Path>) -> Result<Self, GenericError> {
        let loader = match path {
            Some(path) => ConfigurationLoader::default().from_yaml(path)?,
            None => ConfigurationLoader::default(),
        };

        Ok(loader.from_environment(ENV_PREFIX)?.into_typed()?)
    }

    /// Returns the explicitly allowed CORS origins. An empty list allows any origin.
    pub fn allowed_origins(&self) -> Vec<&str> {
        let origins: Vec<&str> = match &self.cors_allowed_origins {
            None => Vec::new(),
            Some(OriginList::Joined(joined)) => joined.split(',').collect(),
            Some(OriginList::Listed(listed)) => listed.iter().map(String::as_str).collect(),
        };

        origins
            .into_iter()
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    /// Builds the CORS layer wrapping the API.
    ///
    /// # Errors
    ///
    /// If an allowed origin is not a valid header value, an error is returned.
    pub fn cors_layer(&self) -> Result<CorsLayer, GenericError> {
        let origins = self.allowed_origins();
        let allow_origin = if origins.is_empty() {
            AllowOrigin::any()
        } else {
            let origins = origins
                .into_iter()
                .map(|origin| {
                    HeaderValue::from_str(origin).with_error_context(|| format!("Invalid CORS origin '{}'.", origin))
                })
                .collect::<Result<Vec<_>, _>>()?;
            AllowOrigin::list(origins)
        };

        Ok(CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::POST])
            .allow_headers([header::CONTENT_TYPE]))
    }

    /// Builds the parse pipeline: sessions under the session root, the ANTLR tool as compiler, and interpreter data
    /// as generated artifacts.
    pub fn build_pipeline(&self) -> ParsePipeline {
        ParsePipeline::new(
            Arc::new(DirectorySessionStore::new(&self.session_root, self.retain_sessions)),
            Arc::new(AntlrCompiler::from_configuration(self.antlr.clone())),
            Arc::new(InterpArtifactLoader),
        )
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    fn load(path: Option<&str>) -> Result<ApiConfiguration, figment::Error> {
        ApiConfiguration::load(path.map(Path::new)).map_err(|e| format!("{:?}", e).into())
    }

    #[test]
    fn defaults() {
        Jail::expect_with(|_| {
            let config = load(None)?;

            assert_eq!(config.listen_address, "0.0.0.0:5000".parse().unwrap());
            assert_eq!(config.session_root, std::env::temp_dir());
            assert!(!config.retain_sessions);
            assert!(config.allowed_origins().is_empty());
            assert_eq!(config.antlr.antlr_jar, PathBuf::from("vendor/antlr-4.13.2-complete.jar"));
            assert_eq!(config.antlr.java_bin, PathBuf::from("java"));
            assert_eq!(config.antlr.target_language, "Java");
            assert!(config.antlr.check_exit_status);
            assert_eq!(config.antlr.compile_timeout_secs, 0);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tusk.yaml",
                "listen_address: 127.0.0.1:8080\nantlr_jar: /opt/antlr.jar\nretain_sessions: true\n\
                 cors_allowed_origins:\n  - https://a.example\n  - https://b.example\n",
            )?;
            jail.set_env("TUSK_ANTLR_JAR", "/srv/antlr.jar");
            jail.set_env("TUSK_COMPILE_TIMEOUT_SECS", "30");

            let config = load(Some("tusk.yaml"))?;
            assert_eq!(config.listen_address, "127.0.0.1:8080".parse().unwrap());
            assert_eq!(config.antlr.antlr_jar, PathBuf::from("/srv/antlr.jar"));
            assert_eq!(config.antlr.compile_timeout_secs, 30);
            assert!(config.retain_sessions);
            assert_eq!(config.allowed_origins(), ["https://a.example", "https://b.example"]);
            Ok(())
        });
    }

    #[test]
    fn comma_separated_origins() {
        Jail::expect_with(|jail| {
            jail.set_env("TUSK_CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,");

            let config = load(None)?;
            assert_eq!(config.allowed_origins(), ["https://a.example", "https://b.example"]);
            assert!(config.cors_layer().is_ok());
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_error() {
        Jail::expect_with(|_| {
            assert!(load(Some("missing.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn invalid_origin_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("TUSK_CORS_ALLOWED_ORIGINS", "https://a.example\u{7f}");

            let config = load(None)?;
            assert!(config.cors_layer().is_err());
            Ok(())
        });
    }
}
