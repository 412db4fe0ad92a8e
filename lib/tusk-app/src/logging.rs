//! Logging.

use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter, Layer,
};
use tusk_error::{generic_error, GenericError};

/// Environment variable holding the log filtering directives, such as `info` or `tusk_grammar=debug,info`.
pub const LOG_LEVEL_ENV_VAR: &str = "TUSK_LOG_LEVEL";

/// Environment variable switching the output format to JSON when set to `true` or `1`.
pub const LOG_FORMAT_JSON_ENV_VAR: &str = "TUSK_LOG_FORMAT_JSON";

/// Logs a message to standard error and exits the process with a non-zero exit code.
pub fn fatal_and_exit(message: String) {
    eprintln!("FATAL: {}", message);
    std::process::exit(1);
}

/// Initializes the logging subsystem for `tracing`.
///
/// The `TUSK_LOG_LEVEL` environment variable controls the filtering directives, falling back to `default_level` (or
/// `INFO` when not given) if it is unset or unparseable. When `TUSK_LOG_FORMAT_JSON` is set to `true` or `1`, events
/// are written as flattened JSON objects; otherwise a compact, human-readable format is used.
///
/// Events emitted through the `log` facade are captured as well.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error will be returned.
pub fn initialize_logging(default_level: Option<LevelFilter>) -> Result<(), GenericError> {
    let is_json = std::env::var(LOG_FORMAT_JSON_ENV_VAR)
        .map(|value| is_truthy(&value))
        .unwrap_or(false);

    let level_filter = EnvFilter::builder()
        .with_default_directive(default_level.unwrap_or(LevelFilter::INFO).into())
        .with_env_var(LOG_LEVEL_ENV_VAR)
        .from_env_lossy();

    let output_layer = if is_json {
        tracing_subscriber::fmt::Layer::new()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::Layer::new()
            .compact()
            .with_ansi(true)
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(output_layer.with_filter(level_filter))
        .try_init()
        .map_err(|e| generic_error!("Failed to install logging subscriber: {}", e))
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value == "true" || value == "1"
}
