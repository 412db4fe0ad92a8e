//! Generated artifact loading.
//!
//! A successful compilation leaves interpreter data for the lexer and the parser in the session directory. Loading
//! turns those files into recognizer definitions and registers each one in a process-wide registry under a fresh,
//! never reused identity. Registrations last as long as the [`LoadedArtifacts`] that holds their leases.

use std::{
    collections::HashMap,
    fmt, io,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

use async_trait::async_trait;
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::debug;
use tusk_runtime::{
    DefinitionError, InterpDataError, InterpreterData, LexerDefinition, LexerFactory, ParserDefinition, ParserFactory,
};

use crate::{
    layout::GrammarLayout,
    session::{random_token, Session},
};

const ARTIFACT_PREFIX: &str = "gensym_";
const ARTIFACT_SUFFIX_LEN: usize = 32;

/// Artifact loading error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ArtifactError {
    /// A generated file could not be read.
    #[snafu(display("Failed to read generated file '{}': {}", path.display(), source))]
    Read { path: PathBuf, source: io::Error },

    /// A generated file does not hold valid interpreter data.
    #[snafu(display("Malformed interpreter data in '{}': {}", path.display(), source))]
    Malformed { path: PathBuf, source: InterpDataError },

    /// Interpreter data does not describe a usable recognizer.
    #[snafu(display("Invalid recognizer in '{}': {}", path.display(), source))]
    InvalidRecognizer { path: PathBuf, source: DefinitionError },

    /// The entry point of a loaded unit could not be resolved.
    #[snafu(display("Entry point '{}' not found in artifact {}", entry_point, id))]
    EntryPointMissing { id: ArtifactId, entry_point: String },
}

/// Process-unique identity of a loaded artifact.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Returns the identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recognizer definition loaded from a generated unit.
#[derive(Clone)]
enum Unit {
    Lexer(LexerDefinition),
    Parser(ParserDefinition),
}

impl Unit {
    fn entry_point(&self) -> &str {
        match self {
            Self::Lexer(definition) => definition.name(),
            Self::Parser(definition) => definition.name(),
        }
    }
}

static REGISTRY: LazyLock<Mutex<HashMap<ArtifactId, Unit>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

fn registry() -> std::sync::MutexGuard<'static, HashMap<ArtifactId, Unit>> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps an artifact registered. The artifact is unregistered when the lease is dropped.
#[derive(Debug)]
pub struct ArtifactLease {
    id: ArtifactId,
}

impl ArtifactLease {
    /// Returns the identity the artifact is registered under.
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }
}

impl Drop for ArtifactLease {
    fn drop(&mut self) {
        registry().remove(&self.id);
        debug!(id = %self.id, "Unregistered artifact.");
    }
}

/// Registers `unit` under a fresh identity.
fn register(unit: Unit) -> ArtifactLease {
    let mut registry = registry();
    let id = loop {
        let candidate = ArtifactId(format!("{}{}", ARTIFACT_PREFIX, random_token(ARTIFACT_SUFFIX_LEN)));
        if !registry.contains_key(&candidate) {
            break candidate;
        }
    };
    registry.insert(id.clone(), unit);
    ArtifactLease { id }
}

/// Resolves the unit registered under `id` whose entry point is named `entry_point`.
fn resolve(id: &ArtifactId, entry_point: &str) -> Option<Unit> {
    registry()
        .get(id)
        .filter(|unit| unit.entry_point() == entry_point)
        .cloned()
}

/// Returns `true` if an artifact is currently registered under `id`.
pub fn is_registered(id: &ArtifactId) -> bool {
    registry().contains_key(id)
}

/// A loaded lexer and parser pair.
///
/// The pair stays registered until this value is dropped.
pub struct LoadedArtifacts {
    pub lexer: Arc<dyn LexerFactory>,
    pub parser: Arc<dyn ParserFactory>,
    leases: Vec<ArtifactLease>,
}

impl LoadedArtifacts {
    /// Creates a pair from already constructed factories, without registering them.
    pub fn new(lexer: Arc<dyn LexerFactory>, parser: Arc<dyn ParserFactory>) -> Self {
        Self {
            lexer,
            parser,
            leases: Vec::new(),
        }
    }

    /// Returns the identities the pair is registered under.
    pub fn ids(&self) -> impl Iterator<Item = &ArtifactId> {
        self.leases.iter().map(ArtifactLease::id)
    }
}

/// Loads the artifacts a compilation produced.
#[async_trait]
pub trait ArtifactLoader: Send + Sync {
    /// Loads the lexer and parser described by `layout` from the session directory.
    ///
    /// # Errors
    ///
    /// If either unit is missing, malformed, or of the wrong kind, an error is returned.
    async fn load(&self, session: &Session, layout: &GrammarLayout) -> Result<LoadedArtifacts, ArtifactError>;
}

/// Loads artifacts from the `.interp` interpreter data the compiler writes for every recognizer.
#[derive(Default)]
pub struct InterpArtifactLoader;

impl InterpArtifactLoader {
    async fn read_unit(dir: &Path, unit: &str) -> Result<(PathBuf, InterpreterData), ArtifactError> {
        let path = dir.join(format!("{}.interp", unit));
        debug!(path = %path.display(), "Loading generated unit.");

        let contents = tokio::fs::read_to_string(&path).await.context(Read { path: &path })?;
        let data = contents
            .parse::<InterpreterData>()
            .context(Malformed { path: &path })?;
        Ok((path, data))
    }
}

#[async_trait]
impl ArtifactLoader for InterpArtifactLoader {
    async fn load(&self, session: &Session, layout: &GrammarLayout) -> Result<LoadedArtifacts, ArtifactError> {
        let (parser_path, parser_data) = Self::read_unit(session.path(), &layout.parser_unit()).await?;
        let (lexer_path, lexer_data) = Self::read_unit(session.path(), &layout.lexer_unit()).await?;

        let parser_entry_point = layout.parser_entry_point();
        let parser_definition = ParserDefinition::from_interpreter_data(&parser_entry_point, &parser_data)
            .context(InvalidRecognizer { path: parser_path })?;
        let lexer_entry_point = layout.lexer_entry_point();
        let lexer_definition = LexerDefinition::from_interpreter_data(&lexer_entry_point, &lexer_data)
            .context(InvalidRecognizer { path: lexer_path })?;

        let parser_lease = register(Unit::Parser(parser_definition));
        let lexer_lease = register(Unit::Lexer(lexer_definition));
        debug!(parser = %parser_lease.id(), lexer = %lexer_lease.id(), "Registered generated units.");

        let parser = match resolve(parser_lease.id(), &parser_entry_point) {
            Some(Unit::Parser(definition)) => Some(definition),
            _ => None,
        }
        .context(EntryPointMissing {
            id: parser_lease.id().clone(),
            entry_point: parser_entry_point,
        })?;
        let lexer = match resolve(lexer_lease.id(), &lexer_entry_point) {
            Some(Unit::Lexer(definition)) => Some(definition),
            _ => None,
        }
        .context(EntryPointMissing {
            id: lexer_lease.id().clone(),
            entry_point: lexer_entry_point,
        })?;

        Ok(LoadedArtifacts {
            lexer: Arc::new(lexer),
            parser: Arc::new(parser),
            leases: vec![parser_lease, lexer_lease],
        })
    }
}
