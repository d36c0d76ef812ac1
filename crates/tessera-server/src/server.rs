//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use tessera_tasks::Project;

use crate::reload::{client_script, ReloadHub, ReloadMessage};

const SCRIPT_TAG: &str = r#"<script src="/__reload.js"></script>"#;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory served as the site root
    pub base_dir: PathBuf,

    pub host: String,

    pub port: u16,

    /// Prefix of server log lines
    pub log_prefix: String,

    /// Requested public tunnel; not supported
    pub tunnel: Option<String>,

    pub online: bool,

    /// Show an in-page notice on reload
    pub notify: bool,

    /// Open browser on start
    pub open: bool,
}

impl ServerConfig {
    /// Server settings of `project`, with the base directory resolved
    /// against the project root.
    pub fn from_project(project: &Project) -> Self {
        let server = &project.settings.server;
        Self {
            base_dir: project.resolve(&server.base_dir),
            host: server.host.clone(),
            port: server.port,
            log_prefix: server.log_prefix.clone(),
            tunnel: server.tunnel.clone(),
            online: server.online,
            notify: server.notify,
            open: server.open,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("dist"),
            host: "localhost".to_string(),
            port: 7777,
            log_prefix: "tessera".to_string(),
            tunnel: None,
            online: false,
            notify: false,
            open: false,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),

    #[error("File watch error: {0}")]
    Watch(String),
}

/// Shared server state.
struct ServerState {
    hub: ReloadHub,
    script: String,
    log_prefix: String,
}

/// Static file server with live reload.
pub struct DevServer {
    config: ServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            hub: ReloadHub::new(),
        }
    }

    /// Hub used to push reload messages to connected pages.
    pub fn hub(&self) -> ReloadHub {
        self.hub.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router: reload endpoints plus the static directory.
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            hub: self.hub.clone(),
            script: client_script(self.config.notify),
            log_prefix: self.config.log_prefix.clone(),
        });

        Router::new()
            .route("/__reload", get(ws_handler))
            .route("/__reload.js", get(script_handler))
            .fallback_service(ServeDir::new(&self.config.base_dir))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), inject_reload))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr().map_err(ServerError::Serve)?;
        self.announce(local);

        let app = self.router();
        axum::serve(listener, app).await.map_err(ServerError::Serve)
    }

    fn announce(&self, local: SocketAddr) {
        let prefix = &self.config.log_prefix;
        let url = format!("http://{}:{}", self.config.host, local.port());

        tracing::info!(
            "[{}] Serving files from {}",
            prefix,
            self.config.base_dir.display()
        );
        tracing::info!("[{}] Local: {}", prefix, url);

        if let Some(tunnel) = &self.config.tunnel {
            tracing::warn!("[{}] Tunnels are not supported, ignoring '{}'", prefix, tunnel);
        }
        if !self.config.online {
            tracing::debug!("[{}] Offline mode", prefix);
        }

        if self.config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("[{}] Could not open browser: {}", prefix, e);
            }
        }
    }
}

/// Insert the reload script before `</body>`, or append it when the
/// document has no closing body tag.
pub fn inject_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + SCRIPT_TAG.len());
            out.push_str(&html[..index]);
            out.push_str(SCRIPT_TAG);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, SCRIPT_TAG),
    }
}

/// Rewrite successful HTML responses to load the reload client.
async fn inject_reload(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;
    tracing::debug!("[{}] {} {} {}", state.log_prefix, method, uri, response.status());

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("[{}] Failed to read {}: {}", state.log_prefix, uri, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward hub messages to one page until it goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_json(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send_json(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("[{}] Client missed {} messages", state.log_prefix, skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

/// Handler for the reload client script.
async fn script_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        state.script.clone(),
    )
}
