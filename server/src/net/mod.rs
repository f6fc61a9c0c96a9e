//! WebSocket transport.
//!
//! One upgraded connection per client. Each connection runs a reader loop on
//! its own task plus a writer task draining that session's frame queue, so a
//! slow client never stalls anyone else.

pub mod dispatcher;
pub mod registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use log::{info, trace};
use tokio::sync::mpsc;

use crate::context::SimContext;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

pub fn router(ctx: Arc<SimContext>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(ctx)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<SimContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<SimContext>) {
    let session_id = format!("session_{}", NEXT_SESSION.fetch_add(1, Ordering::Relaxed));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    ctx.connections.add_session(session_id.clone(), tx);
    info!(
        "New connection {} ({} sessions active)",
        session_id,
        ctx.connections.session_count()
    );

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            Message::Text(text) => {
                trace!("{} -> {}", session_id, text.as_str());
                let outbox = dispatcher::handle_frame(&ctx, &session_id, text.as_str());
                ctx.connections.dispatch_all(&outbox);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    let outbox = dispatcher::handle_disconnect(&ctx, &session_id);
    ctx.connections.dispatch_all(&outbox);
    writer.abort();
}
