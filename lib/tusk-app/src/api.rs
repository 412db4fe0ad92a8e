//! API server.

use std::{future::Future, net::SocketAddr};

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use tusk_error::{ErrorContext as _, GenericError};

/// An API handler.
///
/// API handlers define the initial state and routes for a portion of an API.
pub trait APIHandler {
    /// State shared by the handler's routes.
    type State: Clone + Send + Sync + 'static;

    /// Builds the state handed to the handler's routes.
    fn generate_initial_state(&self) -> Self::State;

    /// Builds the routes served by this handler.
    fn generate_routes(&self) -> Router<Self::State>;
}

/// An API builder.
///
/// `APIBuilder` composes an API server from multiple handlers, and lets callers wrap the merged router with
/// cross-cutting layers (CORS, tracing) before serving it.
#[derive(Default)]
pub struct APIBuilder {
    router: Router,
}

impl APIBuilder {
    /// Create a new `APIBuilder` with an empty router.
    pub fn new() -> Self {
        Self { router: Router::new() }
    }

    /// Adds the given handler to this builder.
    ///
    /// The initial state and routes provided by the handler are merged into this builder.
    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: APIHandler,
    {
        let handler_router = handler.generate_routes();
        let handler_state = handler.generate_initial_state();
        self.router = self.router.merge(handler_router.with_state(handler_state));

        self
    }

    /// Applies a transformation to the merged router, typically to add middleware layers.
    pub fn map_router<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Router) -> Router,
    {
        self.router = f(self.router);
        self
    }

    /// Consumes the builder, returning the merged router.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serves the API on the given address until `shutdown` resolves.
    ///
    /// In-flight requests are allowed to complete once shutdown has been triggered.
    ///
    /// ## Errors
    ///
    /// If the server fails to bind to the address, or fails while accepting connections, an error will be returned.
    pub async fn serve<F>(self, listen_address: SocketAddr, shutdown: F) -> Result<(), GenericError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(listen_address)
            .await
            .with_error_context(|| format!("Failed to bind API listener to {}.", listen_address))?;

        info!("API server listening on {}.", listen_address);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .error_context("API server failed while serving connections.")
    }
}
