//! Listener setup.

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::routes::create_router;
use crate::state::AppState;

/// Serve the transport until `shutdown` resolves.
pub async fn start_server(
    state: AppState,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state, &config.cors);
    let listener = TcpListener::bind(config.address()).await?;

    info!(
        "voxstream speech server listening on ws://{}/api/speech/ws",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
