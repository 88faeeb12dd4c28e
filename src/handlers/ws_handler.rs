// src/handlers/ws_handler.rs
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing;

use crate::{
    handlers::CurrentUser,
    models::vehicle::VehicleLocationUpdate,
    services::{
        dispatch_service::DispatchOperations,
        realtime_service::{Realtime, RealtimeEvent},
        vehicle_service::VehicleOperations,
    },
    state::AppState,
};

/// Frames drivers and riders send upstream. Everything the server sends
/// downstream goes through the hub as `{ "event": …, "data": … }`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum ClientMessage {
    RideLocation(VehicleLocationUpdate),
    RideEta,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection_id = state.hub.register(&user_id, tx).await;

    // Everything emitted to this user is drained from the hub channel
    // onto the socket by a dedicated writer task.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            WsMessage::Text(text) => {
                let client_message: ClientMessage = match serde_json::from_str(&text) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::warn!("Ignoring malformed frame from {}: {}", user_id, e);
                        continue;
                    }
                };
                handle_client_message(&state, &user_id, client_message).await;
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    state.hub.unregister(&user_id, connection_id).await;
    writer.abort();
}

async fn handle_client_message(state: &Arc<AppState>, user_id: &str, message: ClientMessage) {
    match message {
        ClientMessage::RideLocation(update) => {
            if let Err(e) = state.vehicle_service.update_location(user_id, update).await {
                tracing::warn!("Ignoring location update from {}: {}", user_id, e);
            }
        }
        ClientMessage::RideEta => match state.dispatch_service.driver_eta(user_id).await {
            Ok(Some((eta, location))) => {
                state
                    .hub
                    .emit(
                        user_id,
                        RealtimeEvent::RideEta,
                        json!({ "eta": eta, "location": location }),
                    )
                    .await;
            }
            // No live trip, nothing to answer.
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Could not answer eta request from {}: {}", user_id, e);
            }
        },
    }
}
