// src/services/realtime_service.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, RwLock};
use tracing;
use uuid::Uuid;

/// Everything the engine pushes to riders and drivers, by wire name.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RealtimeEvent {
    ConnectingToDriver,
    RideRequest,
    RideRequestCancelled,
    TripStarted,
    TripCancelled,
    DriverArrived,
    TripInProgress,
    TripEnded,
    PaymentFailed,
    NewMessage,
    DriversBusy,
    RideEta,
}

impl RealtimeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeEvent::ConnectingToDriver => "connecting-to-driver",
            RealtimeEvent::RideRequest => "ride-request",
            RealtimeEvent::RideRequestCancelled => "ride-request-cancelled",
            RealtimeEvent::TripStarted => "trip-started",
            RealtimeEvent::TripCancelled => "trip-cancelled",
            RealtimeEvent::DriverArrived => "driver-arrived",
            RealtimeEvent::TripInProgress => "trip-in-progress",
            RealtimeEvent::TripEnded => "trip-ended",
            RealtimeEvent::PaymentFailed => "payment-failed",
            RealtimeEvent::NewMessage => "new-message",
            RealtimeEvent::DriversBusy => "drivers-busy",
            RealtimeEvent::RideEta => "ride-eta",
        }
    }
}

/// Fire-and-forget push channel. Delivery problems are logged, never
/// surfaced to callers: a dead phone connection must not fail a trip
/// transition.
#[async_trait]
pub trait Realtime: Send + Sync {
    async fn emit(&self, user_id: &str, event: RealtimeEvent, payload: serde_json::Value);
}

/// WebSocket fan-out hub. A user can hold several live sockets (phone
/// and web at once); every one of them gets each frame.
pub struct WsHub {
    connections: RwLock<HashMap<String, Vec<(Uuid, mpsc::UnboundedSender<String>)>>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, user_id: &str, sender: mpsc::UnboundedSender<String>) -> Uuid {
        let connection_id = Uuid::new_v4();
        let mut connections = self.connections.write().await;
        connections
            .entry(user_id.to_string())
            .or_default()
            .push((connection_id, sender));
        tracing::debug!("Registered socket {} for user {}", connection_id, user_id);
        connection_id
    }

    pub async fn unregister(&self, user_id: &str, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(sockets) = connections.get_mut(user_id) {
            sockets.retain(|(id, _)| *id != connection_id);
            if sockets.is_empty() {
                connections.remove(user_id);
            }
        }
        tracing::debug!("Unregistered socket {} for user {}", connection_id, user_id);
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Realtime for WsHub {
    async fn emit(&self, user_id: &str, event: RealtimeEvent, payload: serde_json::Value) {
        let frame = json!({ "event": event.as_str(), "data": payload }).to_string();

        let connections = self.connections.read().await;
        match connections.get(user_id) {
            Some(sockets) => {
                for (connection_id, sender) in sockets {
                    if sender.send(frame.clone()).is_err() {
                        tracing::warn!(
                            "Dropping {} for user {}: socket {} closed",
                            event.as_str(),
                            user_id,
                            connection_id
                        );
                    }
                }
            }
            None => {
                tracing::debug!("No live socket for user {}, skipping {}", user_id, event.as_str());
            }
        }
    }
}

// Recording sink for development and testing
pub struct RecordingRealtime {
    events: Mutex<Vec<(String, RealtimeEvent, serde_json::Value)>>,
}

impl RecordingRealtime {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<(String, RealtimeEvent, serde_json::Value)> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn events_for(&self, user_id: &str) -> Vec<(RealtimeEvent, serde_json::Value)> {
        self.events()
            .into_iter()
            .filter(|(user, _, _)| user == user_id)
            .map(|(_, event, payload)| (event, payload))
            .collect()
    }
}

impl Default for RecordingRealtime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Realtime for RecordingRealtime {
    async fn emit(&self, user_id: &str, event: RealtimeEvent, payload: serde_json::Value) {
        tracing::debug!("[MOCK] emit {} to {}", event.as_str(), user_id);
        if let Ok(mut events) = self.events.lock() {
            events.push((user_id.to_string(), event, payload));
        }
    }
}
