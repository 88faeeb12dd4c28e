// src/services/vehicle_service.rs
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::{
        trip::TripStatus,
        vehicle::{
            GeoPoint, RegisterVehicleRequest, Vehicle, VehicleLocationUpdate, VehicleStatus,
        },
    },
    store::Database,
    utils::id_generator::{IdType, WithGeneratedId},
};

#[async_trait]
pub trait VehicleOperations: Send + Sync {
    async fn register_vehicle(
        &self,
        driver_id: &str,
        request: RegisterVehicleRequest,
    ) -> Result<Vehicle, AppError>;
    async fn get_own_vehicles(&self, driver_id: &str) -> Result<Vec<Vehicle>, AppError>;
    async fn remove_vehicle(&self, driver_id: &str, vehicle_id: &str) -> Result<Vehicle, AppError>;
    async fn set_status(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        status: VehicleStatus,
    ) -> Result<Vehicle, AppError>;
    async fn update_location(
        &self,
        driver_id: &str,
        update: VehicleLocationUpdate,
    ) -> Result<Vehicle, AppError>;
}

pub struct VehicleService {
    db: Arc<Database>,
    finishing_radius_m: f64,
}

impl VehicleService {
    pub fn new(db: Arc<Database>, finishing_radius_m: f64) -> Self {
        Self {
            db,
            finishing_radius_m,
        }
    }
}

#[async_trait]
impl VehicleOperations for VehicleService {
    async fn register_vehicle(
        &self,
        driver_id: &str,
        request: RegisterVehicleRequest,
    ) -> Result<Vehicle, AppError> {
        tracing::info!("Registering vehicle for driver {}", driver_id);

        let now = Utc::now();
        let mut vehicle = Vehicle {
            id: String::new(),
            driver_id: driver_id.to_string(),
            brand: request.brand,
            model: request.model,
            color: request.color,
            registration: request.registration,
            vehicle_type: request.vehicle_type,
            status: VehicleStatus::Pending,
            location: request.location,
            hourly_rate: request.hourly_rate.unwrap_or(0),
            daily_rate: request.daily_rate.unwrap_or(0),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        vehicle.set_generated_id(IdType::Vehicle);
        self.db.vehicles.insert(&vehicle.id, vehicle.clone()).await;

        tracing::info!("Vehicle {} registered", vehicle.id);
        Ok(vehicle)
    }

    async fn get_own_vehicles(&self, driver_id: &str) -> Result<Vec<Vehicle>, AppError> {
        tracing::debug!("Listing vehicles of driver {}", driver_id);

        let mut vehicles = self
            .db
            .vehicles
            .find(|v| v.driver_id == driver_id && !v.deleted)
            .await;
        vehicles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(vehicles)
    }

    async fn remove_vehicle(&self, driver_id: &str, vehicle_id: &str) -> Result<Vehicle, AppError> {
        tracing::info!("Removing vehicle {} of driver {}", vehicle_id, driver_id);

        self.db
            .vehicles
            .update_one(
                |v| v.id == vehicle_id && v.driver_id == driver_id && !v.deleted,
                |v| {
                    v.deleted = true;
                    v.status = VehicleStatus::Offline;
                    v.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(|| AppError::not_found("vehicle not found"))
    }

    async fn set_status(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        status: VehicleStatus,
    ) -> Result<Vehicle, AppError> {
        // Drivers only toggle their shift; Busy and FinishingTrip belong
        // to the dispatcher
        if !matches!(status, VehicleStatus::Online | VehicleStatus::Offline) {
            return Err(AppError::bad_request("vehicle status cannot be changed"));
        }

        tracing::info!("Setting vehicle {} to {:?}", vehicle_id, status);

        self.db
            .vehicles
            .update_one(
                |v| {
                    v.id == vehicle_id
                        && v.driver_id == driver_id
                        && !v.deleted
                        && matches!(
                            v.status,
                            VehicleStatus::Offline | VehicleStatus::Online | VehicleStatus::Pending
                        )
                },
                |v| {
                    v.status = status;
                    v.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(|| AppError::bad_request("vehicle status cannot be changed"))
    }

    async fn update_location(
        &self,
        driver_id: &str,
        update: VehicleLocationUpdate,
    ) -> Result<Vehicle, AppError> {
        let location = GeoPoint {
            latitude: update.latitude,
            longitude: update.longitude,
            heading: update.heading,
        };

        let moved = location.clone();
        let updated = self
            .db
            .vehicles
            .update_one(
                |v| v.id == update.vehicle && v.driver_id == driver_id && !v.deleted,
                |v| {
                    v.location = moved;
                    v.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(|| AppError::not_found("vehicle not found"))?;

        // A busy vehicle closing in on its trip's last waypoint becomes
        // dispatchable again before the trip formally ends
        if updated.status == VehicleStatus::Busy {
            let trip = self
                .db
                .trips
                .find_one(|t| {
                    t.vehicle_id == updated.id && t.status == TripStatus::InProgress && !t.deleted
                })
                .await;
            if let Some(trip) = trip {
                if location.distance_m(trip.final_destination()) <= self.finishing_radius_m {
                    if let Some(finishing) = self
                        .db
                        .vehicles
                        .update_one(
                            |v| v.id == updated.id && v.status == VehicleStatus::Busy,
                            |v| {
                                v.status = VehicleStatus::FinishingTrip;
                                v.updated_at = Utc::now();
                            },
                        )
                        .await
                    {
                        tracing::info!("Vehicle {} is finishing trip {}", finishing.id, trip.id);
                        return Ok(finishing);
                    }
                }
            }
        }

        Ok(updated)
    }
}
