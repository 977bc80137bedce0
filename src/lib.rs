//! DICOMweb server library: wires the storage, cache, pipeline, router and
//! dispatcher components into a running `axum` application (spec §2 Flow:
//! Pipeline -> Router -> Cache -> Dispatcher -> Storage Provider).

pub mod cache;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod identity;
pub mod json;
pub mod multipart;
pub mod pipeline;
pub mod router;
pub mod storage;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::Router as AxumRouter;
use tower_http::trace::TraceLayer;
use tracing::info;

use tokio::sync::Semaphore;

use cache::{CacheConfig as CacheRuntimeConfig, ResponseCache};
use config::Config;
use pipeline::Pipeline;
use router::Router;
use storage::StorageProvider;

/// Shared state for every request: the storage backend, the response
/// cache, the request pipeline, the compiled route table, the effective
/// configuration (spec §5 "three independent shared singletons"), and a
/// semaphore bounding `server.max_concurrent_requests` simultaneous
/// handlers.
pub struct AppState {
    pub storage: Arc<dyn StorageProvider>,
    pub cache: ResponseCache,
    pub pipeline: Pipeline<Response>,
    pub router: Router,
    pub config: Config,
    pub concurrency: Semaphore,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn StorageProvider>) -> Self {
        let cache = ResponseCache::new(CacheRuntimeConfig::from(config.cache.clone()));
        let pipeline = Pipeline::new(config.pipeline.clone().into());
        let concurrency = Semaphore::new(config.server.max_concurrent_requests.max(1));
        Self {
            storage,
            cache,
            pipeline,
            router: Router::new(),
            config,
            concurrency,
        }
    }
}

/// Builds the `axum` application. A single fallback handles every
/// method/path so the crate's own [`router::Router`] remains the sole
/// source of truth for path-template matching, rather than duplicating
/// routes into axum's matcher. `axum`'s own default body-size limit is
/// disabled because the dispatcher enforces `server.max_request_body_size`
/// itself, mapping an oversize body to the §7 `PayloadTooLarge` kind
/// rather than axum's generic 413.
pub fn build_app(state: Arc<AppState>) -> AxumRouter {
    AxumRouter::new()
        .fallback(handle)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatcher::dispatch(state, method, uri, headers, body).await
}

/// Binds and serves the application until a shutdown signal arrives,
/// finishing in-flight requests and stopping the pipeline cooperatively
/// (spec §5 Cancellation).
pub async fn run(config: Config, storage: Arc<dyn StorageProvider>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, storage));
    let app = build_app(state.clone());

    info!(%addr, "starting dicomweb-server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    state.pipeline.stop().await;
    result
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining in-flight requests");
}
