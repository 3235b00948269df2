//! Development server implementation.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{
    body::{self, Body},
    extract::{ws::WebSocketUpgrade, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use goose_static::{rebuild_site, BuildConfig};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::shutdown::shutdown_channel;
use crate::watcher::{debounce, FileWatcher, WatchError};
use crate::websocket::{reload_client_script, ReloadHub, ReloadMessage};

/// Path of the live reload WebSocket endpoint.
pub const RELOAD_PATH: &str = "/ws";

/// Largest HTML document the injection middleware will buffer.
const MAX_HTML_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Site to rebuild; its output directory is what gets served
    pub build: BuildConfig,

    /// Source directory to watch
    pub watch_dir: PathBuf,

    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Quiet period before a rebuild
    pub debounce: Duration,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::from_source(".", "dist"),
            watch_dir: PathBuf::from("."),
            host: "127.0.0.1".to_string(),
            port: 3000,
            debounce: Duration::from_millis(300),
            open: false,
        }
    }
}

impl DevServerConfig {
    /// Socket address to bind.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ServerError::InvalidAddress(addr))
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    Bind(SocketAddr, io::Error),

    #[error("Server error: {0}")]
    Serve(io::Error),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            hub: ReloadHub::new(),
        }
    }

    /// Hub the server notifies after each rebuild.
    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Serve and watch until `signal` resolves.
    ///
    /// Binding the port and registering the watched directories happen up
    /// front; failing either is returned before anything is spawned. Once
    /// `signal` resolves (or the HTTP server stops on its own) both tasks are
    /// told to stop and joined.
    pub async fn run(self, signal: impl Future<Output = ()>) -> Result<(), ServerError> {
        let addr = self.config.addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(addr, e))?;

        self.run_on(listener, signal).await
    }

    /// Like [`DevServer::run`], on a listener that is already bound.
    pub async fn run_on(
        self,
        listener: TcpListener,
        signal: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr().map_err(ServerError::Serve)?;
        let (watcher, events) =
            FileWatcher::new(&self.config.watch_dir, Some(&self.config.build.output_dir))?;
        tracing::debug!("Watching {} directories", watcher.watched_dirs().len());

        let (trigger, shutdown) = shutdown_channel();
        let app = router(&self.config.build.output_dir, self.hub.clone());

        let mut server = tokio::spawn({
            let mut shutdown = shutdown.clone();
            async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { shutdown.wait().await })
                    .await
            }
        });

        let watch_task = tokio::spawn({
            let build = self.config.build.clone();
            let hub = self.hub.clone();
            let quiet_period = self.config.debounce;
            async move {
                let on_settled = move || {
                    let build = build.clone();
                    let hub = hub.clone();
                    async move { rebuild_and_notify(&build, &hub).await }
                };
                debounce(events, quiet_period, on_settled, shutdown).await;
                drop(watcher);
            }
        });

        let url = format!("http://{}", addr);
        tracing::info!("Now serving on {}. Watching for changes...", url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        let early = tokio::select! {
            _ = signal => {
                tracing::info!("Shutting down...");
                None
            }
            result = &mut server => Some(result),
        };

        trigger.trigger();
        watch_task.await?;

        let served = match early {
            Some(result) => result,
            None => server.await,
        };
        served?.map_err(ServerError::Serve)
    }
}

/// Build the router: live reload socket plus the output directory.
pub fn router(serve_dir: &Path, hub: ReloadHub) -> Router {
    Router::new()
        .route(RELOAD_PATH, get(ws_handler))
        .fallback_service(ServeDir::new(serve_dir))
        .layer(middleware::from_fn(inject_reload_script))
        .with_state(hub)
}

/// Rebuild the site, then tell every connected client to reload.
///
/// The broadcast only goes out once the rebuild has returned, so reloading
/// browsers fetch the new output. A failed rebuild is logged and nobody is
/// notified.
pub async fn rebuild_and_notify(build: &BuildConfig, hub: &ReloadHub) {
    tracing::info!("--- Change detected!");

    let config = build.clone();
    match tokio::task::spawn_blocking(move || rebuild_site(&config)).await {
        Ok(Ok(report)) => {
            let notified = hub.broadcast(ReloadMessage::Reload);
            tracing::info!(
                "Rebuilt {} pages in {}ms, reloading {} client(s)",
                report.pages,
                report.duration_ms,
                notified
            );
        }
        Ok(Err(e)) => tracing::error!("Rebuild failed: {}", e),
        Err(e) => tracing::error!("Rebuild task failed: {}", e),
    }
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| tracing::warn!("WebSocket upgrade error: {}", e))
        .on_upgrade(move |socket| async move { hub.serve_client(socket).await })
}

/// Middleware adding the reload script to every HTML page served.
async fn inject_reload_script(request: Request, next: Next) -> Response {
    let is_head = request.method() == Method::HEAD;
    let response = next.run(request).await;

    if is_head || response.status() != StatusCode::OK || !is_html(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body::to_bytes(body, MAX_HTML_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read HTML response: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response();
        }
    };

    let html = String::from_utf8_lossy(&bytes);
    let injected = inject_script(&html, &reload_client_script(RELOAD_PATH));

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(injected))
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Insert `script` right before the last `</body>`, or append it when the
/// document has none.
fn inject_script(html: &str, script: &str) -> String {
    const BODY_CLOSE: &str = "</body>";

    let mut out = String::with_capacity(html.len() + script.len());
    match html.rfind(BODY_CLOSE) {
        Some(pos) => {
            out.push_str(&html[..pos]);
            out.push_str(script);
            out.push_str(&html[pos..]);
        }
        None => {
            out.push_str(html);
            out.push_str(script);
        }
    }
    out
}
