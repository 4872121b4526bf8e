//! Pass-through HTTP relay in front of the inference service
//!
//! Routes:
//! - POST /api/ser - Forward a multipart `file` upload to `<backend>/predict`
//! - POST /predict - Same, for clients that target the backend path directly
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::DEFAULT_UPLOAD_NAME;
pub use routes::create_router;
pub use state::AppState;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Bind `addr` and serve the relay until the task is cancelled
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind relay on {}", addr))?;
    info!(
        "Relay listening on {} -> {}",
        listener.local_addr()?,
        state.predict_url()
    );
    axum::serve(listener, create_router(state))
        .await
        .context("Relay server failed")?;
    Ok(())
}
