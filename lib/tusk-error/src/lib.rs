//! Error primitives shared by the binaries and bootstrap code.
//!
//! Library components expose typed errors; anything that only needs to be reported (startup failures,
//! configuration problems, server errors) is funneled through [`GenericError`].
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt::Display;

/// A type-erased error carrying an optional chain of context.
pub type GenericError = anyhow::Error;

/// Constructs a [`GenericError`].
///
/// Accepts a string literal, a format string with arguments, or an existing value that implements `Debug` and
/// `Display`. When given a `std::error::Error`, its source chain is preserved.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
    impl<T> Sealed for Option<T> {}
}

/// Attaches human-readable context to fallible values, converting them into [`GenericError`].
///
/// This mirrors `anyhow::Context` under a distinct name so it can be imported alongside `snafu::ResultExt` without
/// the method names clashing.
pub trait ErrorContext<T>: sealed::Sealed {
    /// Wraps the error (or absent value) with the given context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error (or absent value) with context that is only built when a failure actually occurs.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        anyhow::Context::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        anyhow::Context::with_context(self, f)
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        anyhow::Context::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        anyhow::Context::with_context(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_result_errors() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("disk on fire"));
        let err = result.error_context("Failed to write grammar.").unwrap_err();

        assert_eq!(err.to_string(), "Failed to write grammar.");
        assert_eq!(err.root_cause().to_string(), "disk on fire");
    }

    #[test]
    fn context_converts_missing_values() {
        let value: Option<u32> = None;
        let err = value.with_error_context(|| format!("missing {}", "jar")).unwrap_err();

        assert_eq!(err.to_string(), "missing jar");
        assert_eq!(Some(5).error_context("unused").unwrap(), 5);
    }

    #[test]
    fn macro_accepts_format_arguments() {
        let err = generic_error!("grammar '{}' failed", "Expr");
        assert_eq!(err.to_string(), "grammar 'Expr' failed");
    }
}
