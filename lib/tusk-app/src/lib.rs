//! High-level application primitives.
//!
//! This crate provides the pieces needed to bootstrap a tusk binary before it starts serving: logging initialization
//! and composable API handlers.
#![deny(warnings)]
#![deny(missing_docs)]

#[cfg(feature = "api")]
pub mod api;

#[cfg(feature = "logging")]
pub mod logging;

/// Common imports.
pub mod prelude {
    #[cfg(feature = "api")]
    pub use super::api::{APIBuilder, APIHandler};
    #[cfg(feature = "logging")]
    pub use super::logging::{fatal_and_exit, initialize_logging};
}
