// HTTP / WebSocket transport
// Serves the static page and bridges WebSocket peers to the coordinator

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeFile;

use crate::hub::HubHandle;

/// WebSocket sub-protocol spoken by the sensor firmware
pub const SUBPROTOCOL: &str = "arduino";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// `/` serves `<www>/index.html`, `/ws` upgrades to a peer connection
pub fn router(hub: HubHandle, www: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(www.join("index.html")))
        .route("/ws", get(ws_handler))
        .with_state(hub)
}

pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    TcpListener::bind((host, port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: format!("{}:{}", host, port),
            source,
        })
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("Listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<HubHandle>) -> impl IntoResponse {
    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(mut socket: WebSocket, hub: HubHandle) {
    let (peer, mut frames) = match hub.connect() {
        Ok(registered) => registered,
        Err(e) => {
            log::warn!("Refusing connection: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // Dropped by the coordinator
                    None => break,
                }
            }
            msg = socket.recv() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            log::debug!("Ignoring non UTF-8 frame from {}", peer);
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        log::debug!("Connection {} failed: {}", peer, e);
                        break;
                    }
                };
                if hub.submit(peer, text).is_err() {
                    break;
                }
            }
        }
    }

    // The coordinator may already be gone during shutdown
    let _ = hub.disconnect(peer);
}
