// src/models/trip.rs
// Created on 14-07-2026 by Alfred Lotsu
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::vehicle::{GeoPoint, Vehicle, VehicleType};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TripStatus {
    Started,       // Trip created, driver heading to pickup
    DriverArrived, // Driver waiting at the pickup point
    InProgress,    // Rider on board
    Completed,     // Ended and settled
    Cancelled,     // Abandoned before the ride began
    PaymentFailed, // Ended but settlement was declined
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum PaymentMethod {
    Cash,
    RulBalance,    // In-app stored value
    Card,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TripStopStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TripStop {
    pub location: GeoPoint,
    pub address: String,
    pub status: TripStopStatus,
    pub distance_m: f64,        // Road distance from the previous waypoint
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TripRating {
    pub score: u8,              // 1-5
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Trip {
    pub id: String,
    pub rider_id: String,
    pub driver_id: String,
    pub vehicle_id: String,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub from: GeoPoint,
    pub from_address: String,
    pub to: GeoPoint,
    pub to_address: String,
    pub stops: Vec<TripStop>,
    pub distance_m: f64,        // Road distance pickup to destination
    pub status: TripStatus,
    pub cancellation_reason: Option<String>,
    pub rating: Option<TripRating>,
    pub meta: Option<serde_json::Value>, // Settlement receipts and failures
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request/Response Models
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StopRequest {
    pub location: GeoPoint,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequestTripRequest {
    pub vehicle_type: VehicleType,
    pub payment_method: PaymentMethod,
    pub from: GeoPoint,
    pub from_address: String,
    pub to: GeoPoint,
    pub to_address: String,
    pub stops: Option<Vec<StopRequest>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestTripResponse {
    pub ride: Vehicle,          // Top candidate, offers start with this one
    pub tracking_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingRequest {
    pub score: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTripRequest {
    pub status: Option<TripStatus>,
    pub rating: Option<RatingRequest>,
    pub stops: Option<Vec<StopRequest>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct QuoteResponse {
    pub classic: i64,
    pub luxury: i64,
}

/// Either a pending request (tracking id) or a live trip, never both.
#[derive(Debug, Serialize, Deserialize)]
pub struct OngoingTripResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip: Option<Trip>,
}

// Helper implementations
impl TripStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TripStatus::Completed | TripStatus::Cancelled | TripStatus::PaymentFailed
        )
    }
}

impl Trip {
    pub fn is_party(&self, user_id: &str) -> bool {
        self.rider_id == user_id || self.driver_id == user_id
    }

    /// Total billable road distance: the main leg plus every stop leg.
    pub fn final_distance_m(&self) -> f64 {
        self.distance_m + self.stops.iter().map(|s| s.distance_m).sum::<f64>()
    }

    /// Where the trip ultimately ends: the last stop if any, otherwise
    /// the requested destination.
    pub fn final_destination(&self) -> &GeoPoint {
        self.stops.last().map(|s| &s.location).unwrap_or(&self.to)
    }
}
