// src/models/message.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// In-trip chat message between rider and driver. Immutable once created.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub trip_id: String,
    pub sender_id: String,
    pub text: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}
