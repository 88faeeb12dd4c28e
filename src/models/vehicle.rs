// src/models/vehicle.rs
// Created on 14-07-2026 by Alfred Lotsu
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum VehicleType {
    Classic,   // Standard ride tier
    Luxury,    // Premium ride tier
    Hire,      // Rented out through the hire flow, never dispatched
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum VehicleStatus {
    Offline,       // Not taking trips
    Online,        // Available for dispatch
    Busy,          // On an active trip or rented out
    FinishingTrip, // Close to the destination of the current trip
    Pending,       // Newly registered, not yet activated
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,   // Direction in degrees (0-360)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vehicle {
    pub id: String,
    pub driver_id: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub registration: String,
    pub vehicle_type: VehicleType,
    pub status: VehicleStatus,
    pub location: GeoPoint,
    pub hourly_rate: i64,       // Hire pricing, integer minor units
    pub daily_rate: i64,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request/Response Models
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterVehicleRequest {
    pub brand: String,
    pub model: String,
    pub color: String,
    pub registration: String,
    pub vehicle_type: VehicleType,
    pub location: GeoPoint,
    pub hourly_rate: Option<i64>,
    pub daily_rate: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateVehicleStatusRequest {
    pub status: VehicleStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailableVehiclesQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub vehicle_type: Option<VehicleType>,
    pub radius_m: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VehicleLocationUpdate {
    pub vehicle: String,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
}

/// One brand bucket of the hire catalogue.
#[derive(Debug, Serialize, Deserialize)]
pub struct HireCatalogGroup {
    pub brand: String,
    pub count: usize,
    pub vehicles: Vec<Vehicle>,
}

// Helper implementations
impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, heading: None }
    }

    /// Straight-line (haversine) distance in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let earth_radius_m = 6_371_000.0;
        let lat1_rad = self.latitude.to_radians();
        let lat2_rad = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        earth_radius_m * c
    }
}

impl VehicleStatus {
    /// Statuses eligible for dispatch. Drivers wrapping up a trip are
    /// offered rides after fully idle drivers.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, VehicleStatus::Online | VehicleStatus::FinishingTrip)
    }
}
