use crate::signaling::signaling_router::SignalingRouter;
use axum::Router;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Mounts the signaling WebSocket at `path`.
pub fn signaling_routes(path: &str, router: SignalingRouter) -> Router {
    Router::new()
        .route(path, get(ws_handler))
        .with_state(router)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(router): State<SignalingRouter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, router))
}

async fn handle_socket(socket: WebSocket, router: SignalingRouter) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let client_id = router.accept(tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let router = router.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => router.dispatch(client_id, &text).await,
                    Message::Close(_) => break,
                    other => debug!("Ignoring non-text frame from {}: {:?}", client_id, other),
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    router.disconnect(client_id).await;
    info!("WebSocket closed: {}", client_id);
}
