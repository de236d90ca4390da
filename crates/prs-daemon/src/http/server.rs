use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::http::routes::create_router;
use crate::state::ApiState;

/// Bind `host:port` and serve the API until `shutdown` resolves.
pub async fn serve(
    state: Arc<ApiState>,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "http server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("http server stopped");
    Ok(())
}
