use anyhow::Result;
use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::broadcast;

const HTTP_403_BODY: &str = "<html><body><h1>Error: 403 - Forbidden</h1></body></html>";
const HTTP_404_BODY: &str = "<html><body><h1>Error: 404 - File not found</h1></body></html>";

/// Shared coordination between rebuilds and the preview server.
///
/// Rebuilds and the server's read-and-respond cycle both hold `lock` for
/// their full duration, so a response never observes a half-written output
/// tree and two rebuilds never overlap. `dirty` is the "content is stale"
/// signal set after each rebuild.
pub struct BuildCoordinator {
    lock: tokio::sync::Mutex<()>,
    dirty: AtomicBool,
    reload_tx: broadcast::Sender<String>,
}

impl BuildCoordinator {
    pub fn new() -> Self {
        let (reload_tx, _) = broadcast::channel(100);
        Self {
            lock: tokio::sync::Mutex::new(()),
            dirty: AtomicBool::new(false),
            reload_tx,
        }
    }

    /// Acquire the process-wide build lock. No timeout, no cancellation.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Flag the output tree as rebuilt and tell connected clients to
    /// reload.
    pub fn mark_stale(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        let _ = self.reload_tx.send("reload".to_string());
    }

    /// Consume the stale signal.
    pub fn take_stale(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.reload_tx.subscribe()
    }
}

impl Default for BuildCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the live preview server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Output tree to serve
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            root: PathBuf::from("./out"),
            open: false,
        }
    }
}

/// A live-reload preview server over the generated output tree.
pub struct LiveServer {
    config: LiveServerConfig,
    coordinator: Arc<BuildCoordinator>,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig, coordinator: Arc<BuildCoordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    /// Run the live server
    pub async fn run(self) -> Result<()> {
        if !self.config.root.exists() {
            return Err(anyhow::anyhow!(
                "Output directory does not exist: {}",
                self.config.root.display()
            ));
        }

        let state = AppState {
            coordinator: self.coordinator.clone(),
            root: self.config.root.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
        };

        let app = Router::new()
            .route("/__livereload", get(websocket_handler))
            .fallback(get(serve_file))
            .with_state(state);

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;

        println!("Serving at http://{}", addr);
        println!("Serving output: {}", self.config.root.display());
        println!("Live reload enabled at ws://{}/__livereload", addr);

        if self.config.open {
            if let Err(e) = open::that(format!("http://{}", addr)) {
                eprintln!("Failed to open browser: {}", e);
            }
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    coordinator: Arc<BuildCoordinator>,
    root: PathBuf,
    host: String,
    port: u16,
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket_connection(socket, state.coordinator))
}

async fn websocket_connection(mut socket: WebSocket, coordinator: Arc<BuildCoordinator>) {
    let mut rx = coordinator.subscribe();

    // Send initial connection confirmation
    if socket
        .send(Message::Text("connected".to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    // A rebuild may have finished before this client connected.
    if coordinator.take_stale()
        && socket
            .send(Message::Text("reload".to_string().into()))
            .await
            .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(reload_msg) => {
                        if socket.send(Message::Text(reload_msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

/// Serve one file from the output tree, holding the build lock for the
/// whole read-and-respond cycle so a rebuild can't be observed mid-write.
async fn serve_file(State(state): State<AppState>, uri: Uri) -> Response {
    let mut path = uri.path().to_string();
    if path == "/" {
        path = "/index.html".to_string();
    }

    if path.contains("..") {
        return forbidden();
    }
    let Some(content_type) = content_type_for(&path) else {
        println!("requested unsupported file type: {}", path);
        return forbidden();
    };

    let _guard = state.coordinator.lock().await;

    let full_path = state.root.join(path.trim_start_matches('/'));
    match tokio::fs::read(&full_path).await {
        Ok(mut contents) => {
            if content_type.starts_with("text/html") {
                let html = String::from_utf8_lossy(&contents);
                contents = inject_livereload_script(&html, &state.host, state.port).into_bytes();
            }
            ([(header::CONTENT_TYPE, content_type)], contents).into_response()
        }
        Err(_) => {
            println!("respond: 404: {}", full_path.display());
            (
                StatusCode::NOT_FOUND,
                [(header::CONTENT_TYPE, "text/html;charset=UTF-8")],
                HTTP_404_BODY,
            )
                .into_response()
        }
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::CONTENT_TYPE, "text/html;charset=UTF-8")],
        HTTP_403_BODY,
    )
        .into_response()
}

/// Content types the preview server is willing to serve; anything else is
/// rejected with a 403.
fn content_type_for(path: &str) -> Option<&'static str> {
    if path.ends_with(".html") {
        Some("text/html;charset=UTF-8")
    } else if path.ends_with(".css") {
        Some("text/css;charset=UTF-8")
    } else if path.ends_with(".js") {
        Some("application/javascript;charset=UTF-8")
    } else if path.ends_with(".ttf") || path.ends_with(".woff2") {
        Some("application/octet-stream")
    } else if path.ends_with(".png") {
        Some("image/png")
    } else if path.ends_with(".jpg") {
        Some("image/jpeg")
    } else {
        None
    }
}

/// Inject live reload script into HTML content
pub fn inject_livereload_script(html: &str, host: &str, port: u16) -> String {
    let script = format!(
        r#"
<script>
(function() {{
    const socket = new WebSocket('ws://{}:{}/__livereload');
    socket.onmessage = function(event) {{
        if (event.data === 'reload') {{
            location.reload();
        }}
    }};
    socket.onclose = function() {{
        console.log('Live reload disconnected');
    }};
}})();
</script>
"#,
        host, port
    );

    // Inject before the closing body tag, or at the end if not found
    if let Some(pos) = html.rfind("</body>") {
        let mut result = String::with_capacity(html.len() + script.len());
        result.push_str(&html[..pos]);
        result.push_str(&script);
        result.push_str(&html[pos..]);
        result
    } else {
        format!("{}{}", html, script)
    }
}
