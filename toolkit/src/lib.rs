//! # toolkit: helpers for axum backends
//!
//! `toolkit` bundles the small chores most HTTP handlers repeat: storing multipart uploads,
//! serving files as downloads, decoding JSON bodies strictly, writing JSON responses in a
//! common envelope, building slugs and random identifiers, and pushing JSON to another
//! service.
//!
//! Everything hangs off [`Toolkit`], which owns a [`ToolkitConfig`] (upload and JSON size
//! caps, allowed upload types, unknown-field policy). Operations read the configuration and
//! never change it, and none of them spawn tasks: each runs on the handler's own task, once
//! per request.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{Router, extract::{Multipart, State}, response::Response, routing::post};
//! use toolkit::{Toolkit, ToolkitConfig, errors::Error};
//!
//! async fn upload(State(toolkit): State<Arc<Toolkit>>, multipart: Multipart) -> Result<Response, Error> {
//!     let files = toolkit.upload_files(multipart, "./uploads", None).await?;
//!     toolkit.write_json(axum::http::StatusCode::CREATED, &files, None)
//! }
//!
//! let toolkit = Toolkit::new(ToolkitConfig {
//!     allowed_types: vec!["image/png".into(), "image/jpeg".into()],
//!     ..Default::default()
//! });
//! let app: Router = Router::new().route("/upload", post(upload)).with_state(Arc::new(toolkit));
//! ```
//!
//! ## Failure model
//!
//! Errors are returned as [`errors::Error`] values whose messages are safe to show to
//! clients; `Error` renders itself as the JSON error envelope. Nothing is retried. When a
//! multipart batch fails validation part way, files already stored stay on disk and are
//! reported in [`errors::UploadFailure`]; exceeding the size limit removes them instead.
//!
//! The crate also ships a small demo server (`src/main.rs`) exposing each operation over
//! HTTP; see [`build_router`] and [`Application`].

pub mod api;
pub mod config;
mod download;
pub mod errors;
mod fs;
pub mod json;
mod random;
mod remote;
mod slug;
pub mod sniff;
pub mod telemetry;
pub mod upload;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};

pub use config::{Config, ToolkitConfig};
pub use errors::{Error, Result, UploadFailure};
pub use json::{JsonResponse, StrictJson};
pub use upload::UploadedFile;

/// Entry point for every toolkit operation; holds the configuration they read.
#[derive(Debug, Clone, Default)]
pub struct Toolkit {
    config: ToolkitConfig,
}

impl Toolkit {
    pub fn new(config: ToolkitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// Mutable access for callers adjusting limits between requests. Do not change the
    /// configuration of a toolkit that an in-flight request is using.
    pub fn config_mut(&mut self) -> &mut ToolkitConfig {
        &mut self.config
    }
}

/// Shared state of the demo server.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub toolkit: Arc<Toolkit>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let toolkit = Arc::new(Toolkit::new(config.toolkit.clone()));
        Self {
            config,
            toolkit,
            http: reqwest::Client::new(),
        }
    }
}

impl FromRef<AppState> for Arc<Toolkit> {
    fn from_ref(state: &AppState) -> Self {
        state.toolkit.clone()
    }
}

/// Build the demo router: one route per toolkit operation.
pub fn build_router(state: AppState) -> Router {
    use api::handlers::{files, utils};

    // Uploads are capped by the toolkit's own size accounting instead of axum's default limit
    let upload_routes = Router::new()
        .route("/files", post(files::upload_files))
        .route("/files/one", post(files::upload_file))
        .layer(DefaultBodyLimit::disable());

    Router::new()
        .merge(upload_routes)
        .route("/files/{name}", get(files::download_file))
        .route("/slugs", post(utils::create_slug))
        .route("/random", get(utils::random_string))
        .route("/echo", post(utils::echo))
        .route("/push", post(utils::push))
        .route("/healthz", get(|| async { "OK" }))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The demo server.
///
/// 1. **Create**: [`Application::new`] prepares the upload directory and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting toolkit demo server with configuration: {:#?}", config);

        let state = AppState::new(config.clone());
        state.toolkit.create_dir_if_not_exists(&config.upload_dir).await?;

        let router = build_router(state);
        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Toolkit demo server listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Server stopped");
        Ok(())
    }
}
