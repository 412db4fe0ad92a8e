//! Request sessions.
//!
//! Every request gets its own directory to write grammars into and to run the compiler in, so concurrent requests
//! never see each other's files, even when their grammars share a name.

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng as _};
use snafu::{ResultExt as _, Snafu};
use tokio::{fs::OpenOptions, io::AsyncWriteExt as _, runtime::Handle};
use tracing::{debug, warn};

/// Prefix of every session directory name.
pub const SESSION_PREFIX: &str = "tusk_";

const SUFFIX_LEN: usize = 32;

/// Returns `length` random ASCII letters and digits, drawn from a cryptographically secure generator.
pub(crate) fn random_token(length: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Session error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SessionError {
    /// The session directory could not be created.
    #[snafu(display("Failed to create session directory '{}': {}", path.display(), source))]
    CreateDirectory { path: PathBuf, source: io::Error },

    /// A grammar file could not be written.
    #[snafu(display("Failed to write grammar file '{}': {}", path.display(), source))]
    WriteGrammar { path: PathBuf, source: io::Error },
}

/// An isolated working directory for a single request.
///
/// Unless the session is retained, its directory and everything in it is removed by [`Session::close`]. A session
/// dropped without being closed is removed on the blocking pool of the current runtime, or in place when there is no
/// runtime.
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    retain: bool,
    closed: bool,
}

impl Session {
    /// Wraps an existing, empty directory as a session.
    pub fn new(path: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            path: path.into(),
            retain,
            closed: false,
        }
    }

    /// Returns the path of the session directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `grammar` to `<name>.g4` in the session directory, returning the path of the new file.
    ///
    /// # Errors
    ///
    /// If the file already exists, or cannot be written, an error is returned.
    pub async fn write_grammar(&self, name: &str, grammar: &str) -> Result<PathBuf, SessionError> {
        let path = self.path.join(format!("{}.g4", name));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .context(WriteGrammar { path: &path })?;
        file.write_all(grammar.as_bytes())
            .await
            .context(WriteGrammar { path: &path })?;
        file.flush().await.context(WriteGrammar { path: &path })?;

        debug!(path = %path.display(), "Wrote grammar file.");
        Ok(path)
    }

    /// Ends the session, removing its directory unless it is retained.
    pub async fn close(mut self) {
        self.closed = true;
        if self.retain {
            debug!(path = %self.path.display(), "Retaining session directory.");
            return;
        }

        log_removal(&self.path, tokio::fs::remove_dir_all(&self.path).await);
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!(path = %path.display(), "Removed session directory."),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove session directory."),
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.retain {
            debug!(path = %self.path.display(), "Retaining session directory.");
            return;
        }

        let path = std::mem::take(&mut self.path);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let result = std::fs::remove_dir_all(&path);
                    log_removal(&path, result);
                });
            }
            Err(_) => {
                let result = std::fs::remove_dir_all(&path);
                log_removal(&path, result);
            }
        }
    }
}

/// Creates sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a new session backed by a fresh, empty directory.
    ///
    /// # Errors
    ///
    /// If the directory cannot be created, an error is returned.
    async fn create(&self) -> Result<Session, SessionError>;
}

/// A session store that creates session directories under a root directory.
pub struct DirectorySessionStore {
    root: PathBuf,
    retain_sessions: bool,
}

impl DirectorySessionStore {
    /// Creates a new `DirectorySessionStore` rooted at `root`.
    ///
    /// When `retain_sessions` is `true`, session directories are left in place once their request completes.
    pub fn new(root: impl Into<PathBuf>, retain_sessions: bool) -> Self {
        Self {
            root: root.into(),
            retain_sessions,
        }
    }
}

#[async_trait]
impl SessionStore for DirectorySessionStore {
    async fn create(&self) -> Result<Session, SessionError> {
        let path = self.root.join(format!("{}{}", SESSION_PREFIX, random_token(SUFFIX_LEN)));
        // `create_dir` fails if the directory already exists, so a session is never handed out twice.
        tokio::fs::create_dir(&path)
            .await
            .context(CreateDirectory { path: &path })?;

        debug!(path = %path.display(), "Created session directory.");
        Ok(Session::new(path, self.retain_sessions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_unique_and_empty() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectorySessionStore::new(root.path(), false);

        let first = store.create().await.unwrap();
        let second = store.create().await.unwrap();

        assert_ne!(first.path(), second.path());
        for session in [&first, &second] {
            let name = session.path().file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with(SESSION_PREFIX));
            assert_eq!(name.len(), SESSION_PREFIX.len() + SUFFIX_LEN);
            assert!(name[SESSION_PREFIX.len()..].chars().all(|c| c.is_ascii_alphanumeric()));
            assert_eq!(std::fs::read_dir(session.path()).unwrap().count(), 0);
        }
    }

    #[tokio::test]
    async fn closing_a_session_removes_its_directory() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectorySessionStore::new(root.path(), false);

        let session = store.create().await.unwrap();
        session.write_grammar("Expr", "grammar Expr;").await.unwrap();
        let path = session.path().to_path_buf();
        session.close().await;

        assert!(!path.exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dropping_a_session_inside_a_runtime_removes_it_off_the_worker() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectorySessionStore::new(root.path(), false);

        let session = store.create().await.unwrap();
        let path = session.path().to_path_buf();
        drop(session);

        for _ in 0..500 {
            if !path.exists() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("session directory was not removed");
    }

    #[test]
    fn dropping_a_session_without_a_runtime_removes_it_in_place() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("session");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("Expr.g4"), "grammar Expr;").unwrap();

        drop(Session::new(&path, false));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn retained_sessions_survive() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectorySessionStore::new(root.path(), true);

        let session = store.create().await.unwrap();
        let path = session.path().to_path_buf();
        session.close().await;
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn missing_root_is_a_storage_error() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectorySessionStore::new(root.path().join("does/not/exist"), false);

        let err = store.create().await.unwrap_err();
        assert!(matches!(err, SessionError::CreateDirectory { .. }));
    }

    #[tokio::test]
    async fn grammar_files_are_named_after_the_grammar() {
        let root = tempfile::tempdir().unwrap();
        let session = Session::new(root.path(), true);

        let path = session.write_grammar("Expr", "grammar Expr;\n").await.unwrap();
        assert_eq!(path, root.path().join("Expr.g4"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "grammar Expr;\n");
    }

    #[tokio::test]
    async fn grammar_files_are_never_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let session = Session::new(root.path(), true);

        session.write_grammar("Expr", "grammar Expr;").await.unwrap();
        let err = session.write_grammar("Expr", "grammar Other;").await.unwrap_err();

        assert!(matches!(err, SessionError::WriteGrammar { .. }));
        assert_eq!(std::fs::read_to_string(root.path().join("Expr.g4")).unwrap(), "grammar Expr;");
    }
}
