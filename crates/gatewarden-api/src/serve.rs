// gatewarden-api/src/serve.rs
// ============================================================================
// Module: HTTP Server
// Description: Binds the router built by `routes::build_router` to a TCP
//              listener and serves it.
// Purpose: Keep the bind/serve boilerplate out of the CLI crate, which only
//          needs to decide the address and own the process lifetime.
// Dependencies: axum::serve, tokio::net::TcpListener
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use crate::routes::build_router;
use crate::state::AppState;

/// Errors raised while starting the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The server exited with an I/O error while serving connections.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Binds `addr` and serves the HTTP API over `state` until the process is
/// terminated.
///
/// # Errors
/// Returns [`ServeError::Bind`] if `addr` cannot be bound, or
/// [`ServeError::Serve`] if the listener fails while serving connections.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!(%addr, "gatewarden-api listening");
    let app = build_router(state);
    axum::serve(listener, app).await.map_err(ServeError::Serve)
}
