//! HTTP inspection endpoints listing each stage's processor catalog.
//!
//! | Path                      | Lists                  |
//! |---------------------------|------------------------|
//! | `/informationcollectors`  | information collectors |
//! | `/diagnosers`             | diagnosers             |
//! | `/recoverers`             | recoverers             |
//!
//! Only `GET` is served. Other methods get `405 method <M> is not supported`;
//! a store failure gets `500`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::stage::Stage;
use crate::api::ProcessorType;
use crate::store::ResourceStore;

/// Builds the inspection router over `store`.
pub fn inspection_router<S: ResourceStore>(store: Arc<S>) -> Router {
    let mut router = Router::new();
    for stage in Stage::ALL {
        let config = stage.config();
        router = router.route(config.inspection_path, list_route::<S>(config.processor_type));
    }
    router.with_state(store)
}

fn list_route<S: ResourceStore>(kind: ProcessorType) -> MethodRouter<Arc<S>> {
    get(move |State(store): State<Arc<S>>| list_processors(store, kind)).fallback(method_not_allowed)
}

async fn list_processors<S: ResourceStore>(store: Arc<S>, kind: ProcessorType) -> Response {
    debug!(kind = %kind, "Listing processors");
    match store.list_processors(kind).await {
        Ok(processors) => Json(processors).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to list processors: {}", e),
        )
            .into_response(),
    }
}

async fn method_not_allowed(method: Method) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        format!("method {} is not supported", method),
    )
        .into_response()
}

/// Serves the inspection router on `listener` until `shutdown` fires.
pub async fn serve_inspection<S: ResourceStore>(
    listener: TcpListener,
    store: Arc<S>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Inspection server listening");
    }
    axum::serve(listener, inspection_router(store))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
