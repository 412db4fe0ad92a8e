//! Grammar compilation.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use snafu::{ensure, ResultExt as _, Snafu};
use tokio::{process::Command, time::timeout};
use tracing::debug;

use crate::session::Session;

const fn default_check_exit_status() -> bool {
    true
}

fn default_java_bin() -> PathBuf {
    PathBuf::from("java")
}

fn default_antlr_jar() -> PathBuf {
    PathBuf::from("vendor/antlr-4.13.2-complete.jar")
}

fn default_target_language() -> String {
    "Java".to_string()
}

/// Grammar compiler error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum CompilerError {
    /// The compiler jar does not exist.
    #[snafu(display("ANTLR jar not found at '{}'", path.display()))]
    JarNotFound { path: PathBuf },

    /// The compiler process could not be started or awaited.
    #[snafu(display("Failed to run grammar compiler '{}': {}", command.display(), source))]
    Spawn { command: PathBuf, source: io::Error },
}

/// Compiles grammars inside a session.
#[async_trait]
pub trait GrammarCompiler: Send + Sync {
    /// Checks that the compiler can be run at all.
    ///
    /// # Errors
    ///
    /// If the compiler is not installed, an error is returned.
    fn ensure_available(&self) -> Result<(), CompilerError>;

    /// Compiles the grammar `<grammar_name>.g4` in the session directory.
    ///
    /// Returns the compiler's diagnostics, one line per entry. No diagnostics means the grammar compiled, and its
    /// generated files are in the session directory.
    ///
    /// # Errors
    ///
    /// If the compiler cannot be run, an error is returned.
    async fn compile(&self, session: &Session, grammar_name: &str) -> Result<Vec<String>, CompilerError>;
}

/// ANTLR compiler configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct AntlrConfiguration {
    /// Path to the ANTLR tool jar. Relative paths are resolved against the working directory of the process.
    #[serde(default = "default_antlr_jar")]
    pub antlr_jar: PathBuf,

    /// Java executable used to run the tool.
    #[serde(default = "default_java_bin")]
    pub java_bin: PathBuf,

    /// Code generation target passed to the tool.
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Whether a failing exit status with no diagnostics counts as a compilation failure.
    #[serde(default = "default_check_exit_status")]
    pub check_exit_status: bool,

    /// Seconds to wait for the tool before killing it. Zero waits indefinitely.
    #[serde(default)]
    pub compile_timeout_secs: u64,
}

impl Default for AntlrConfiguration {
    fn default() -> Self {
        Self {
            antlr_jar: default_antlr_jar(),
            java_bin: default_java_bin(),
            target_language: default_target_language(),
            check_exit_status: default_check_exit_status(),
            compile_timeout_secs: 0,
        }
    }
}

/// Runs the ANTLR tool as a subprocess.
pub struct AntlrCompiler {
    config: AntlrConfiguration,
}

impl AntlrCompiler {
    /// Creates a new `AntlrCompiler` from the given configuration.
    pub fn from_configuration(config: AntlrConfiguration) -> Self {
        Self { config }
    }

    fn jar_path(&self) -> PathBuf {
        std::path::absolute(&self.config.antlr_jar).unwrap_or_else(|_| self.config.antlr_jar.clone())
    }

    fn command(&self, jar: &Path, session: &Session, grammar_name: &str) -> Command {
        let mut command = Command::new(&self.config.java_bin);
        command
            .arg("-jar")
            .arg(jar)
            .arg(format!("-Dlanguage={}", self.config.target_language))
            .arg("-no-listener")
            .arg(format!("{}.g4", grammar_name))
            .current_dir(session.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl GrammarCompiler for AntlrCompiler {
    fn ensure_available(&self) -> Result<(), CompilerError> {
        let path = self.jar_path();
        ensure!(path.is_file(), JarNotFound { path });
        Ok(())
    }

    async fn compile(&self, session: &Session, grammar_name: &str) -> Result<Vec<String>, CompilerError> {
        let jar = self.jar_path();
        let child = self
            .command(&jar, session, grammar_name)
            .spawn()
            .context(Spawn {
                command: &self.config.java_bin,
            })?;

        debug!(grammar = grammar_name, session = %session.path().display(), "Spawned grammar compiler.");

        // Dropping the child on timeout kills it.
        let output = match self.config.compile_timeout_secs {
            0 => child.wait_with_output().await,
            secs => match timeout(Duration::from_secs(secs), child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => return Ok(vec![format!("grammar compiler timed out after {} seconds", secs)]),
            },
        }
        .context(Spawn {
            command: &self.config.java_bin,
        })?;

        let mut diagnostics = diagnostic_lines(&output.stderr);
        debug!(
            grammar = grammar_name,
            status = %output.status,
            diagnostics = diagnostics.len(),
            "Grammar compiler finished."
        );

        if diagnostics.is_empty() && self.config.check_exit_status && !output.status.success() {
            let status = output
                .status
                .code()
                .map_or_else(|| "unknown".to_string(), |code| code.to_string());
            diagnostics.push(format!("grammar compiler exited with status {}", status));
        }

        Ok(diagnostics)
    }
}

/// Splits compiler output into lines, dropping trailing blank lines.
fn diagnostic_lines(output: &[u8]) -> Vec<String> {
    let mut lines = String::from_utf8_lossy(output)
        .lines()
        .map(str::to_string)
        .collect::<Vec<_>>();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines
}
