// src/models/rental.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::trip::PaymentMethod;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum RentalStatus {
    Pending,    // Created and paid, awaiting the owner's confirmation
    Accepted,   // Owner confirmed the booking
    InProgress, // Renter has the vehicle
    Completed,
    Cancelled,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum BillingType {
    Hourly,
    Daily,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Rental {
    pub id: String,
    pub renter_id: String,
    pub driver_id: String,      // Vehicle owner
    pub vehicle_id: String,
    pub billing_type: BillingType,
    pub payment_method: PaymentMethod,
    pub price: i64,
    pub check_in: Option<DateTime<Utc>>,  // Required for daily rentals
    pub check_out: Option<DateTime<Utc>>,
    pub status: RentalStatus,
    pub meta: Option<serde_json::Value>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request Models
#[derive(Debug, Serialize, Deserialize)]
pub struct HireVehicleRequest {
    pub vehicle_id: String,
    pub billing_type: BillingType,
    pub payment_method: PaymentMethod,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
}

// Helper implementations
impl RentalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RentalStatus::Completed | RentalStatus::Cancelled | RentalStatus::Rejected
        )
    }
}

impl Rental {
    /// Inclusive window overlap against this rental's booked period.
    /// Rentals without a window (hourly bookings) never overlap by date.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        match (self.check_in, self.check_out) {
            (Some(booked_in), Some(booked_out)) => start <= booked_out && booked_in <= end,
            _ => false,
        }
    }
}
