//! Request orchestration.
//!
//! [`ParsePipeline`] drives one request through every stage: validating its shape, naming its grammars, writing and
//! compiling them in a fresh session, loading the generated recognizers, and parsing the source text. Each stage
//! either hands its result to the next or stops the request with a [`PipelineError`], and whatever the request
//! learned up to that point is still reported in the [`ParseResponse`].

use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{IntoError as _, ResultExt as _, Snafu};
use tokio::task::JoinError;
use tracing::{debug, error, warn};
use tusk_runtime::RuleExecutionError;

use crate::{
    artifact::{ArtifactError, ArtifactLoader},
    compiler::{CompilerError, GrammarCompiler},
    executor::{execute, ExecutionError},
    layout::GrammarLayout,
    name::{extract_grammar_name, NameError},
    session::{Session, SessionError, SessionStore},
};

/// A parse request.
///
/// Grammar fields are `None` when absent, blank, or not strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseRequest {
    pub grammar: Option<String>,
    pub lexer: Option<String>,
    pub parser: Option<String>,
    pub source: String,
    pub rule: String,
}

impl ParseRequest {
    /// Reads a request from a JSON body. Bodies that are not JSON objects read as an empty request.
    pub fn from_json(body: &[u8]) -> Self {
        let payload = serde_json::from_slice::<Value>(body).unwrap_or_default();
        let field = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            grammar: field("grammar"),
            lexer: field("lexer"),
            parser: field("parser"),
            source: field("source").unwrap_or_default(),
            rule: field("rule").unwrap_or_default(),
        }
    }
}

/// The response to a parse request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub grammar_name: String,
    pub errors: Vec<String>,
    pub rules: Vec<String>,
    pub string_tree: String,
}

/// Pipeline error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum PipelineError {
    #[snafu(display("{}", message))]
    InvalidRequestShape { message: &'static str },

    #[snafu(display("Could not determine grammar name"))]
    GrammarNameNotFound { source: NameError },

    #[snafu(display("ANTLR jar not found on server"))]
    CompilerUnavailable { source: CompilerError },

    #[snafu(display("Failed to create session directory"))]
    StorageUnavailable { source: SessionError },

    #[snafu(display("Failed to write grammar file"))]
    WriteFailure { source: SessionError },

    #[snafu(display("{}", diagnostics.join("; ")))]
    CompilationFailed { diagnostics: Vec<String> },

    #[snafu(display("Failed to load generated modules"))]
    ArtifactLoadFailure { source: ArtifactError },

    #[snafu(display("{}", source))]
    ConstructionError { source: tusk_runtime::ConstructionError },

    #[snafu(display("No rule specified"))]
    NoRuleSpecified,

    #[snafu(display("Unknown rule '{}'", rule))]
    UnknownRule { rule: String },

    #[snafu(display("{}", source))]
    RuleExecutionFailed { source: RuleExecutionError },

    #[snafu(display("Parser execution aborted"))]
    ExecutionAborted { source: JoinError },
}

impl PipelineError {
    /// Returns the HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoRuleSpecified | Self::UnknownRule { .. } => StatusCode::OK,
            Self::InvalidRequestShape { .. }
            | Self::GrammarNameNotFound { .. }
            | Self::CompilationFailed { .. }
            | Self::ConstructionError { .. }
            | Self::RuleExecutionFailed { .. } => StatusCode::BAD_REQUEST,
            Self::CompilerUnavailable { .. }
            | Self::StorageUnavailable { .. }
            | Self::WriteFailure { .. }
            | Self::ArtifactLoadFailure { .. }
            | Self::ExecutionAborted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the lines reported in the response's `errors` field.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::CompilationFailed { diagnostics } => diagnostics.clone(),
            Self::RuleExecutionFailed { source } => source.messages(),
            other => vec![other.to_string()],
        }
    }
}

impl From<ExecutionError> for PipelineError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::Construction { source } => Construction.into_error(source),
            ExecutionError::NoRuleSpecified { .. } => NoRuleSpecified.build(),
            ExecutionError::UnknownRule { rule, .. } => UnknownRule { rule }.build(),
            ExecutionError::RuleExecution { source, .. } => RuleExecutionFailed.into_error(source),
        }
    }
}

/// Checks which grammar inputs a request carries, returning them as `(declared name, text)` pairs along with their
/// layout.
fn resolve_grammars(request: &ParseRequest) -> Result<(GrammarLayout, Vec<(String, &str)>), PipelineError> {
    let split = request.lexer.is_some() || request.parser.is_some();
    match (&request.grammar, &request.lexer, &request.parser) {
        (Some(_), _, _) if split => InvalidRequestShape {
            message: "Provide either grammar or lexer+parser inputs, not both",
        }
        .fail(),
        (Some(grammar), None, None) => {
            let name = extract_grammar_name(grammar).context(GrammarNameNotFound)?.to_string();
            let grammars = vec![(name.clone(), grammar.as_str())];
            Ok((GrammarLayout::Unified { name }, grammars))
        }
        (None, Some(lexer), Some(parser)) => {
            let lexer_name = extract_grammar_name(lexer).context(GrammarNameNotFound)?.to_string();
            let parser_name = extract_grammar_name(parser).context(GrammarNameNotFound)?.to_string();
            if lexer_name == parser_name {
                return InvalidRequestShape {
                    message: "Lexer and parser grammars must declare different names",
                }
                .fail();
            }
            let grammars = vec![(lexer_name.clone(), lexer.as_str()), (parser_name.clone(), parser.as_str())];
            let layout = GrammarLayout::Split {
                lexer: lexer_name,
                parser: parser_name,
            };
            Ok((layout, grammars))
        }
        (None, None, None) => InvalidRequestShape {
            message: "Missing required fields: grammar or lexer+parser",
        }
        .fail(),
        _ => InvalidRequestShape {
            message: "Missing required fields: lexer, parser",
        }
        .fail(),
    }
}

/// Turns grammars and source text into parse trees.
///
/// Every stage that touches the outside world sits behind a trait object, so deployments and tests choose where
/// sessions live, how grammars get compiled, and how generated units are loaded.
#[derive(Clone)]
pub struct ParsePipeline {
    sessions: Arc<dyn SessionStore>,
    compiler: Arc<dyn GrammarCompiler>,
    loader: Arc<dyn ArtifactLoader>,
}

impl ParsePipeline {
    /// Creates a new `ParsePipeline`.
    pub fn new(
        sessions: Arc<dyn SessionStore>, compiler: Arc<dyn GrammarCompiler>, loader: Arc<dyn ArtifactLoader>,
    ) -> Self {
        Self {
            sessions,
            compiler,
            loader,
        }
    }

    /// Handles a parse request, returning the response and the HTTP status to send it with.
    pub async fn run(&self, request: ParseRequest) -> (StatusCode, ParseResponse) {
        let mut response = ParseResponse::default();
        match self.process(request, &mut response).await {
            Ok(()) => (StatusCode::OK, response),
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    error!(grammar = %response.grammar_name, error = ?e, "Parse request failed.");
                } else {
                    warn!(grammar = %response.grammar_name, error = %e, "Parse request rejected.");
                }
                response.errors = e.messages();
                (status, response)
            }
        }
    }

    async fn process(&self, request: ParseRequest, response: &mut ParseResponse) -> Result<(), PipelineError> {
        let (layout, grammars) = resolve_grammars(&request)?;
        response.grammar_name = layout.grammar_name().to_string();
        debug!(grammar = %response.grammar_name, ?layout, "Validated parse request.");

        self.compiler.ensure_available().context(CompilerUnavailable)?;

        let session = self.sessions.create().await.context(StorageUnavailable)?;
        let result = self.process_in_session(&session, &request, &grammars, &layout, response).await;
        session.close().await;
        result
    }

    async fn process_in_session(
        &self, session: &Session, request: &ParseRequest, grammars: &[(String, &str)], layout: &GrammarLayout,
        response: &mut ParseResponse,
    ) -> Result<(), PipelineError> {
        for (name, grammar) in grammars {
            session.write_grammar(name, grammar).await.context(WriteFailure)?;
        }

        for name in layout.compilation_order() {
            debug!(grammar = name, "Compiling grammar.");
            let diagnostics = self
                .compiler
                .compile(session, name)
                .await
                .context(CompilerUnavailable)?;
            if !diagnostics.is_empty() {
                response.grammar_name = name.to_string();
                return CompilationFailed { diagnostics }.fail();
            }
        }

        let artifacts = self
            .loader
            .load(session, layout)
            .await
            .context(ArtifactLoadFailure)?;
        debug!(grammar = %response.grammar_name, "Loaded generated recognizers.");

        let (source, rule) = (request.source.clone(), request.rule.clone());
        let outcome = tokio::task::spawn_blocking(move || {
            execute(artifacts.parser.as_ref(), artifacts.lexer.as_ref(), &source, &rule)
        })
        .await
        .context(ExecutionAborted)?;

        match outcome {
            Ok(output) => {
                response.rules = output.rules;
                response.string_tree = output.string_tree;
                Ok(())
            }
            Err(e) => {
                response.rules = e.rules().to_vec();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        path::{Path, PathBuf},
        sync::Mutex,
    };

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tusk_runtime::test::{expression_lexer, expression_parser};

    use super::*;
    use crate::{
        artifact::InterpArtifactLoader,
        compiler::JarNotFound,
        session::{DirectorySessionStore, Session},
    };

    const EXPR_GRAMMAR: &str = "grammar Expr;\nprog : expr EOF ;\n";
    const CALC_LEXER: &str = "lexer grammar CalcLexer;\nINT : [0-9]+ ;\n";
    const CALC_PARSER: &str = "parser grammar CalcParser;\noptions { tokenVocab=CalcLexer; }\n";

    /// What the fake compiler does for a grammar.
    #[derive(Clone)]
    enum Outcome {
        /// Writes interpreter data for a combined grammar.
        Unified,
        Lexer,
        Parser,
        Diagnostics(Vec<&'static str>),
    }

    /// A compiler that writes canned interpreter data instead of running the grammar tool.
    struct FakeCompiler {
        available: bool,
        outcomes: HashMap<&'static str, Outcome>,
        compiled: Mutex<Vec<(String, PathBuf, bool)>>,
    }

    impl FakeCompiler {
        fn new(outcomes: &[(&'static str, Outcome)]) -> Self {
            Self {
                available: true,
                outcomes: outcomes.iter().cloned().collect(),
                compiled: Mutex::new(Vec::new()),
            }
        }

        fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::new(&[])
            }
        }

        fn compiled(&self) -> Vec<(String, PathBuf, bool)> {
            self.compiled.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GrammarCompiler for FakeCompiler {
        fn ensure_available(&self) -> Result<(), CompilerError> {
            if self.available {
                Ok(())
            } else {
                JarNotFound { path: "antlr.jar" }.fail()
            }
        }

        async fn compile(&self, session: &Session, grammar_name: &str) -> Result<Vec<String>, CompilerError> {
            let dir = session.path();
            let grammar_written = dir.join(format!("{}.g4", grammar_name)).is_file();
            self.compiled
                .lock()
                .unwrap()
                .push((grammar_name.to_string(), dir.to_path_buf(), grammar_written));

            let write = |unit: String, data: String| {
                std::fs::write(dir.join(format!("{}.interp", unit)), data).unwrap();
            };
            match self.outcomes.get(grammar_name).cloned().unwrap_or(Outcome::Unified) {
                Outcome::Unified => {
                    write(grammar_name.to_string(), expression_parser().to_string());
                    write(format!("{}Lexer", grammar_name), expression_lexer().to_string());
                }
                Outcome::Lexer => write(grammar_name.to_string(), expression_lexer().to_string()),
                Outcome::Parser => write(grammar_name.to_string(), expression_parser().to_string()),
                Outcome::Diagnostics(lines) => return Ok(lines.into_iter().map(str::to_string).collect()),
            }
            Ok(Vec::new())
        }
    }

    struct Harness {
        root: TempDir,
        compiler: Arc<FakeCompiler>,
        pipeline: ParsePipeline,
    }

    impl Harness {
        fn new(compiler: FakeCompiler) -> Self {
            let root = tempfile::tempdir().unwrap();
            Self::with_root(root, compiler, false)
        }

        fn with_root(root: TempDir, compiler: FakeCompiler, retain_sessions: bool) -> Self {
            let compiler = Arc::new(compiler);
            let pipeline = ParsePipeline::new(
                Arc::new(DirectorySessionStore::new(root.path(), retain_sessions)),
                compiler.clone(),
                Arc::new(InterpArtifactLoader),
            );
            Self {
                root,
                compiler,
                pipeline,
            }
        }

        fn sessions(&self) -> usize {
            std::fs::read_dir(self.root.path()).unwrap().count()
        }
    }

    fn unified(source: &str, rule: &str) -> ParseRequest {
        ParseRequest {
            grammar: Some(EXPR_GRAMMAR.to_string()),
            source: source.to_string(),
            rule: rule.to_string(),
            ..ParseRequest::default()
        }
    }

    fn split(source: &str, rule: &str) -> ParseRequest {
        ParseRequest {
            lexer: Some(CALC_LEXER.to_string()),
            parser: Some(CALC_PARSER.to_string()),
            source: source.to_string(),
            rule: rule.to_string(),
            ..ParseRequest::default()
        }
    }

    fn rule_names() -> Vec<String> {
        vec!["prog".to_string(), "expr".to_string(), "atom".to_string()]
    }

    #[test]
    fn request_fields_are_trimmed_and_typed() {
        let request = ParseRequest::from_json(
            br#"{"grammar": "  grammar Expr;  ", "lexer": "   ", "parser": 42, "source": " 1+2 ", "rule": null}"#,
        );
        assert_eq!(
            request,
            ParseRequest {
                grammar: Some("grammar Expr;".to_string()),
                lexer: None,
                parser: None,
                source: "1+2".to_string(),
                rule: String::new(),
            }
        );
    }

    #[test]
    fn unreadable_bodies_are_empty_requests() {
        assert_eq!(ParseRequest::from_json(b"not json"), ParseRequest::default());
        assert_eq!(ParseRequest::from_json(b"[1, 2]"), ParseRequest::default());
        assert_eq!(ParseRequest::from_json(b""), ParseRequest::default());
    }

    #[test]
    fn execution_errors_keep_their_status() {
        let construction = ExecutionError::Construction {
            source: tusk_runtime::ConstructionError::new("parser Expr defines no rules"),
        };
        let err = PipelineError::from(construction);
        assert!(matches!(err, PipelineError::ConstructionError { .. }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.messages(), ["parser Expr defines no rules"]);

        let err = PipelineError::from(ExecutionError::UnknownRule {
            rule: "stmt".to_string(),
            rules: rule_names(),
        });
        assert_eq!(err.status(), StatusCode::OK);
        assert_eq!(err.messages(), ["Unknown rule 'stmt'"]);
    }

    #[tokio::test]
    async fn unified_grammar_parses() {
        let harness = Harness::new(FakeCompiler::new(&[]));

        let (status, response) = harness.pipeline.run(unified("1+2*3", "prog")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response,
            ParseResponse {
                grammar_name: "Expr".to_string(),
                errors: Vec::new(),
                rules: rule_names(),
                string_tree: "(prog (expr (expr (atom 1)) + (expr (expr (atom 2)) * (expr (atom 3)))) <EOF>)"
                    .to_string(),
            }
        );

        let compiled = harness.compiler.compiled();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].0, "Expr");
        assert!(compiled[0].2, "grammar file should be written before compiling");

        // The session is gone once the request completes.
        assert_eq!(harness.sessions(), 0);
    }

    #[tokio::test]
    async fn split_grammar_parses() {
        let harness = Harness::new(FakeCompiler::new(&[
            ("CalcLexer", Outcome::Lexer),
            ("CalcParser", Outcome::Parser),
        ]));

        let (status, response) = harness.pipeline.run(split("(4)", "atom")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.grammar_name, "CalcParser");
        assert_eq!(response.string_tree, "(atom ( (expr (atom 4)) ))");

        let compiled = harness.compiler.compiled();
        let order = compiled.iter().map(|(name, _, _)| name.as_str()).collect::<Vec<_>>();
        assert_eq!(order, ["CalcLexer", "CalcParser"]);
        assert_eq!(compiled[0].1, compiled[1].1, "both grammars compile in the same session");
    }

    #[tokio::test]
    async fn unified_and_split_inputs_conflict() {
        let harness = Harness::new(FakeCompiler::new(&[]));
        let request = ParseRequest {
            parser: Some(CALC_PARSER.to_string()),
            ..unified("1", "prog")
        };

        let (status, response) = harness.pipeline.run(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.errors, ["Provide either grammar or lexer+parser inputs, not both"]);
        assert!(harness.compiler.compiled().is_empty());
    }

    #[tokio::test]
    async fn grammar_inputs_are_required() {
        let harness = Harness::new(FakeCompiler::new(&[]));

        let (status, response) = harness.pipeline.run(ParseRequest::from_json(br#"{"grammar": " "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.errors, ["Missing required fields: grammar or lexer+parser"]);
        assert_eq!(response.grammar_name, "");
    }

    #[tokio::test]
    async fn split_inputs_come_in_pairs() {
        let harness = Harness::new(FakeCompiler::new(&[]));
        let request = ParseRequest {
            parser: None,
            ..split("1", "prog")
        };

        let (status, response) = harness.pipeline.run(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.errors, ["Missing required fields: lexer, parser"]);
    }

    #[tokio::test]
    async fn split_grammars_need_distinct_names() {
        let harness = Harness::new(FakeCompiler::new(&[]));
        let request = ParseRequest {
            parser: Some("parser grammar CalcLexer;\nprog : INT ;\n".to_string()),
            ..split("1", "prog")
        };

        let (status, response) = harness.pipeline.run(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.errors, ["Lexer and parser grammars must declare different names"]);
        assert!(harness.compiler.compiled().is_empty());
        assert_eq!(harness.sessions(), 0);
    }

    #[tokio::test]
    async fn grammar_without_header() {
        let harness = Harness::new(FakeCompiler::new(&[]));
        let request = ParseRequest {
            grammar: Some("prog : EOF ;".to_string()),
            ..ParseRequest::default()
        };

        let (status, response) = harness.pipeline.run(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.errors, ["Could not determine grammar name"]);
        assert_eq!(harness.sessions(), 0);
    }

    #[tokio::test]
    async fn missing_compiler_fails_before_any_session_work() {
        let root = tempfile::tempdir().unwrap();
        let harness = Harness::with_root(root, FakeCompiler::unavailable(), true);

        let (status, response) = harness.pipeline.run(unified("1", "prog")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.errors, ["ANTLR jar not found on server"]);
        assert_eq!(harness.sessions(), 0);
        assert!(harness.compiler.compiled().is_empty());
    }

    #[tokio::test]
    async fn unusable_session_root() {
        let compiler = Arc::new(FakeCompiler::new(&[]));
        let pipeline = ParsePipeline::new(
            Arc::new(DirectorySessionStore::new(Path::new("/nonexistent/tusk/sessions"), false)),
            compiler.clone(),
            Arc::new(InterpArtifactLoader),
        );

        let (status, response) = pipeline.run(unified("1", "prog")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.errors, ["Failed to create session directory"]);
        assert!(compiler.compiled().is_empty());
    }

    #[tokio::test]
    async fn compiler_diagnostics_stop_the_request() {
        let lines = vec!["error(50): Expr.g4:2:0: syntax error", "error(99): Expr.g4::: grammar has no rules"];
        let harness = Harness::new(FakeCompiler::new(&[("Expr", Outcome::Diagnostics(lines.clone()))]));

        let (status, response) = harness.pipeline.run(unified("1", "prog")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response,
            ParseResponse {
                grammar_name: "Expr".to_string(),
                errors: lines.into_iter().map(str::to_string).collect(),
                rules: Vec::new(),
                string_tree: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn failing_split_lexer_is_named_and_parser_is_skipped() {
        let harness = Harness::new(FakeCompiler::new(&[(
            "CalcLexer",
            Outcome::Diagnostics(vec!["error(50): CalcLexer.g4:1:0: syntax error"]),
        )]));

        let (status, response) = harness.pipeline.run(split("1", "prog")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.grammar_name, "CalcLexer");
        assert_eq!(harness.compiler.compiled().len(), 1);
    }

    #[tokio::test]
    async fn failing_split_parser_is_named() {
        let harness = Harness::new(FakeCompiler::new(&[
            ("CalcLexer", Outcome::Lexer),
            ("CalcParser", Outcome::Diagnostics(vec!["error(114): cannot find tokens file"])),
        ]));

        let (_, response) = harness.pipeline.run(split("1", "prog")).await;
        assert_eq!(response.grammar_name, "CalcParser");
        assert_eq!(response.errors, ["error(114): cannot find tokens file"]);
    }

    #[tokio::test]
    async fn missing_generated_units_are_a_server_error() {
        // Only a lexer unit gets generated, under the parser unit's name.
        let harness = Harness::new(FakeCompiler::new(&[("Expr", Outcome::Lexer)]));

        let (status, response) = harness.pipeline.run(unified("1", "prog")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.errors, ["Failed to load generated modules"]);
        assert_eq!(response.grammar_name, "Expr");
    }

    #[tokio::test]
    async fn no_rule_lists_the_rules() {
        let harness = Harness::new(FakeCompiler::new(&[]));

        let (status, response) = harness.pipeline.run(unified("1", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.errors, ["No rule specified"]);
        assert_eq!(response.rules, rule_names());
        assert!(response.string_tree.is_empty());
    }

    #[tokio::test]
    async fn unknown_rule_lists_the_rules() {
        let harness = Harness::new(FakeCompiler::new(&[]));

        let (status, response) = harness.pipeline.run(unified("1", "statement")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.errors, ["Unknown rule 'statement'"]);
        assert_eq!(response.rules, rule_names());
        assert!(response.string_tree.is_empty());
    }

    #[tokio::test]
    async fn syntax_errors_keep_the_rules() {
        let harness = Harness::new(FakeCompiler::new(&[]));

        let (status, response) = harness.pipeline.run(unified("1 $ 2", "prog")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.errors,
            [
                "line 1:2 token recognition error at: '$'",
                "line 1:4 extraneous input '2' expecting <EOF>",
            ]
        );
        assert_eq!(response.rules, rule_names());
        assert!(response.string_tree.is_empty());
    }

    #[tokio::test]
    async fn retained_sessions_keep_their_files() {
        let root = tempfile::tempdir().unwrap();
        let harness = Harness::with_root(root, FakeCompiler::new(&[]), true);

        let (status, _) = harness.pipeline.run(unified("1", "prog")).await;
        assert_eq!(status, StatusCode::OK);

        let (_, session_dir, _) = harness.compiler.compiled().remove(0);
        assert!(session_dir.join("Expr.g4").is_file());
        assert!(session_dir.join("Expr.interp").is_file());
        assert!(session_dir.join("ExprLexer.interp").is_file());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_are_isolated() {
        let harness = Harness::new(FakeCompiler::new(&[]));

        let (first, second) = tokio::join!(
            harness.pipeline.run(unified("1+2", "prog")),
            harness.pipeline.run(unified("(3)", "prog"))
        );
        assert_eq!(first.0, StatusCode::OK);
        assert_eq!(second.0, StatusCode::OK);
        assert_eq!(first.1.string_tree, "(prog (expr (expr (atom 1)) + (expr (atom 2))) <EOF>)");
        assert_eq!(second.1.string_tree, "(prog (expr (atom ( (expr (atom 3)) ))) <EOF>)");

        let compiled = harness.compiler.compiled();
        assert_eq!(compiled.len(), 2);
        assert_ne!(compiled[0].1, compiled[1].1);
    }
}
