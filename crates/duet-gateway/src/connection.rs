use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use duet_types::events::{ClientEvent, ServerEvent};

use crate::relay::Relay;

/// Drive a single WebSocket connection.
///
/// A connection starts unregistered; it becomes addressable only after the
/// client sends an explicit `register` event. Events for the peer arrive on
/// the per-connection channel and are forwarded as JSON text frames. There
/// is no reconnection or session resumption — a drop is terminal.
pub async fn serve(socket: WebSocket, relay: Relay) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    info!("New relay connection {}", conn_id);

    // Forward relayed events to this client.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode relay event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Read events from the client.
    let relay_recv = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => handle_event(&relay_recv, conn_id, &tx, event).await,
                    Err(e) => {
                        warn!(
                            "Connection {} bad event: {} -- raw: {}",
                            conn_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.unregister(conn_id).await;
    info!("Relay connection {} closed", conn_id);
}

async fn handle_event(
    relay: &Relay,
    conn_id: Uuid,
    tx: &mpsc::UnboundedSender<ServerEvent>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Register { user_id } => {
            relay.register(user_id, conn_id, tx.clone()).await;
            info!("User {} registered on connection {}", user_id, conn_id);
        }

        ClientEvent::SendMessage {
            sender_id,
            receiver_id,
            message,
        } => {
            relay
                .relay(
                    receiver_id,
                    ServerEvent::ReceiveMessage {
                        sender_id,
                        message,
                        timestamp: Utc::now(),
                    },
                )
                .await;
        }

        ClientEvent::Typing {
            sender_id,
            receiver_id,
        } => {
            relay
                .relay(receiver_id, ServerEvent::UserTyping { sender_id })
                .await;
        }
    }
}
