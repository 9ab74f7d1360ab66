use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use pullcache_engine::{Filters, TaskManager};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handler;

/// Shared by every request
pub struct AppState {
    /// Cache root
    pub root: PathBuf,
    pub tasks: Arc<TaskManager>,
    pub filters: Filters,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handler::handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Cache server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
