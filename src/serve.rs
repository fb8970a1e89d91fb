//! Dev server with live reload.
//!
//! Serves the build output over HTTP on localhost and pushes a reload
//! message to connected browsers whenever the output tree changes. HTML
//! responses get a small script injected before `</body>` that opens a
//! WebSocket to [`LIVERELOAD_PATH`] and reloads the page on any message.
//! Every response is marked `Cache-Control: no-store`.
//!
//! Output events are debounced the same way source events are: a full
//! rebuild writes many files, and the browser should reload once per
//! burst, not once per file.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{broadcast, watch};

use crate::config::Config;
use crate::watch::Shutdown;

/// WebSocket route the injected client script connects to.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Quiet window drained after the first output event before one reload
/// is pushed.
const RELOAD_QUIET: Duration = Duration::from_millis(150);

const LIVERELOAD_SNIPPET: &str = r#"<script>
(() => {
    const connect = () => {
        const ws = new WebSocket("ws://" + location.host + "/__livereload");
        ws.onmessage = () => location.reload();
        ws.onclose = () => setTimeout(connect, 1000);
    };
    connect();
})();
</script>
"#;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

struct ServerState {
    root: PathBuf,
    reload: broadcast::Sender<()>,
    shutdown: Shutdown,
}

/// Serve the output tree on the configured localhost port until
/// `shutdown` triggers.
pub async fn run(config: Arc<Config>, shutdown: Shutdown) -> Result<(), ServeError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    run_with_listener(listener, config, shutdown).await
}

/// [`run`] on an already-bound listener.
pub async fn run_with_listener(
    listener: TcpListener,
    config: Arc<Config>,
    shutdown: Shutdown,
) -> Result<(), ServeError> {
    let root = config.output_dir();
    std::fs::create_dir_all(&root)?;

    let (reload, _) = broadcast::channel(16);
    let state = Arc::new(ServerState {
        root: root.clone(),
        reload: reload.clone(),
        shutdown: shutdown.clone(),
    });

    // Channel from the blocking notify callback into the async push loop.
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => {
                eprintln!("sitewright: output watch error: {err}");
            }
        },
        notify::Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tokio::spawn(push_reloads(watcher, event_rx, reload, shutdown.clone()));

    let app = Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .fallback(get(serve_static))
        .with_state(state);

    let local = listener.local_addr()?;
    tracing::info!("dev server listening on http://{local}");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown.subscribe()))
        .await?;
    tracing::debug!("dev server stopped");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // check the current value first so a trigger that landed before this
    // future ran is handled without waiting for another send
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Forward output-tree changes to connected clients, one reload per
/// event burst. Owns the watcher so it stays registered for the loop's
/// lifetime.
async fn push_reloads(
    _watcher: RecommendedWatcher,
    mut events: UnboundedReceiver<Event>,
    reload: broadcast::Sender<()>,
    shutdown: Shutdown,
) {
    let mut shutdown_rx = shutdown.subscribe();
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            maybe_event = events.recv() => {
                if maybe_event.is_none() {
                    break;
                }
                tokio::time::sleep(RELOAD_QUIET).await;
                while events.try_recv().is_ok() {}
                let clients = reload.send(()).unwrap_or(0);
                tracing::debug!(clients, "output changed, reload pushed");
            }
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn livereload(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    let reload = state.reload.subscribe();
    let shutdown = state.shutdown.subscribe();
    ws.on_upgrade(move |socket| reload_loop(socket, reload, shutdown))
}

/// Push "reload" to one client until it disconnects or the server shuts
/// down. The shutdown arm matters: graceful shutdown waits for open
/// connections, and a WebSocket never closes on its own.
async fn reload_loop(
    mut socket: WebSocket,
    mut reload: broadcast::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            pushed = reload.recv() => {
                match pushed {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if socket.send(Message::Text("reload".into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

async fn serve_static(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let Some(rel) = sanitize(uri.path()) else {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    };
    let mut path = state.root.join(rel);
    let is_dir = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        path.push("index.html");
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::NOT_FOUND, "not found").into_response(),
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let body = if mime.as_ref() == "text/html" {
        inject_livereload(&String::from_utf8_lossy(&bytes)).into_bytes()
    } else {
        bytes
    };

    (
        [
            (header::CONTENT_TYPE, mime.as_ref()),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}

/// Map a request path to a root-relative file path. Empty and `.`
/// segments collapse; any `..` segment rejects the whole path.
fn sanitize(uri_path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for part in uri_path.trim_start_matches('/').split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            part => clean.push(part),
        }
    }
    Some(clean)
}

/// Insert the reload script before the closing `</body>` tag, or append
/// it when the document has none.
pub fn inject_livereload(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + LIVERELOAD_SNIPPET.len());
    match html.rfind("</body>") {
        Some(idx) => {
            out.push_str(&html[..idx]);
            out.push_str(LIVERELOAD_SNIPPET);
            out.push_str(&html[idx..]);
        }
        None => {
            out.push_str(html);
            out.push_str(LIVERELOAD_SNIPPET);
        }
    }
    out
}
