// src/models/user.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored-value account debited when a trip or rental settles on
/// the in-app balance. Amounts are integer minor units.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Balance {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Card {
    pub id: String,
    pub user_id: String,
    pub provider: String,       // e.g., "visa", "mastercard"
    pub last_four: String,
    pub token: String,          // Provider-issued charge token
    pub is_default: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
