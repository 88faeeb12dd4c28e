// src/services/rental_service.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::{
        rental::{BillingType, HireVehicleRequest, Rental, RentalStatus},
        vehicle::{HireCatalogGroup, Vehicle, VehicleStatus, VehicleType},
    },
    services::payment_service::{PaymentOperations, PaymentService},
    store::{Database, Page},
    utils::id_generator::{IdType, WithGeneratedId},
};

#[async_trait]
pub trait RentalOperations: Send + Sync {
    async fn hire_vehicle(
        &self,
        renter_id: &str,
        request: HireVehicleRequest,
    ) -> Result<Rental, AppError>;
    async fn get_ongoing_rental(&self, renter_id: &str) -> Result<Rental, AppError>;
    async fn get_hire_catalog(&self) -> Result<Vec<HireCatalogGroup>, AppError>;
    async fn get_rental(&self, rental_id: &str) -> Result<Rental, AppError>;
    async fn list_rentals(
        &self,
        status: Option<RentalStatus>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Rental>, AppError>;
}

pub struct RentalService {
    db: Arc<Database>,
    payment_service: Arc<PaymentService>,
}

impl RentalService {
    pub fn new(db: Arc<Database>, payment_service: Arc<PaymentService>) -> Self {
        Self {
            db,
            payment_service,
        }
    }
}

#[async_trait]
impl RentalOperations for RentalService {
    async fn hire_vehicle(
        &self,
        renter_id: &str,
        request: HireVehicleRequest,
    ) -> Result<Rental, AppError> {
        tracing::info!(
            "Hire requested by user {} for vehicle {}",
            renter_id,
            request.vehicle_id
        );

        let window = match (request.check_in, request.check_out) {
            (Some(check_in), Some(check_out)) => Some((check_in, check_out)),
            _ => None,
        };

        // A re-request for a booking the renter already holds returns
        // that booking unchanged. Hourly rentals have no window, so they
        // always count as held.
        let existing = self
            .db
            .rentals
            .find_one(|r| {
                r.renter_id == renter_id
                    && !r.status.is_terminal()
                    && !r.deleted
                    && match r.billing_type {
                        BillingType::Hourly => true,
                        BillingType::Daily => match window {
                            Some((start, end)) => r.overlaps(start, end),
                            None => true,
                        },
                    }
            })
            .await;
        if let Some(rental) = existing {
            tracing::info!("User {} already holds rental {}", renter_id, rental.id);
            return Ok(rental);
        }

        let vehicle = self
            .db
            .vehicles
            .find_one(|v| {
                v.id == request.vehicle_id
                    && !v.deleted
                    && !matches!(v.status, VehicleStatus::Busy | VehicleStatus::Offline)
            })
            .await
            .ok_or_else(|| AppError::bad_request("vehicle not available"))?;

        if request.billing_type == BillingType::Daily {
            let (check_in, check_out) = window
                .ok_or_else(|| AppError::bad_request("please provide check in and check out times"))?;
            if check_in >= check_out {
                return Err(AppError::bad_request("please provide check in and check out times"));
            }

            // Inclusive interval test against every other booking on the
            // vehicle
            let clash = self
                .db
                .rentals
                .find_one(|r| {
                    r.vehicle_id == vehicle.id
                        && !r.status.is_terminal()
                        && !r.deleted
                        && r.billing_type == BillingType::Daily
                        && r.overlaps(check_in, check_out)
                })
                .await;
            if clash.is_some() {
                return Err(AppError::bad_request("vehicle unavailable for selected period"));
            }
        }

        let price = match request.billing_type {
            BillingType::Hourly => vehicle.hourly_rate,
            BillingType::Daily => vehicle.daily_rate,
        };

        // Charge before creating anything, so a declined payment leaves
        // no booking behind
        let receipt = self
            .payment_service
            .charge(renter_id, price, &request.payment_method)
            .await?;

        let now = Utc::now();
        let mut rental = Rental {
            id: String::new(),
            renter_id: renter_id.to_string(),
            driver_id: vehicle.driver_id.clone(),
            vehicle_id: vehicle.id.clone(),
            billing_type: request.billing_type,
            payment_method: request.payment_method,
            price,
            check_in: request.check_in,
            check_out: request.check_out,
            status: RentalStatus::Pending,
            meta: Some(json!({ "paymentResponse": receipt })),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        rental.set_generated_id(IdType::Rental);
        self.db.rentals.insert(&rental.id, rental.clone()).await;

        tracing::info!("Rental {} created for user {}", rental.id, renter_id);
        Ok(rental)
    }

    async fn get_ongoing_rental(&self, renter_id: &str) -> Result<Rental, AppError> {
        tracing::debug!("Fetching ongoing rental for user {}", renter_id);

        self.db
            .rentals
            .find_one(|r| r.renter_id == renter_id && !r.status.is_terminal() && !r.deleted)
            .await
            .ok_or_else(|| AppError::not_found("no ongoing rental"))
    }

    async fn get_hire_catalog(&self) -> Result<Vec<HireCatalogGroup>, AppError> {
        let vehicles = self
            .db
            .vehicles
            .find(|v| {
                !v.deleted
                    && v.vehicle_type == VehicleType::Hire
                    && !matches!(v.status, VehicleStatus::Busy | VehicleStatus::Offline)
            })
            .await;

        // Stable brand order, stable response
        let mut groups: BTreeMap<String, Vec<Vehicle>> = BTreeMap::new();
        for vehicle in vehicles {
            groups.entry(vehicle.brand.clone()).or_default().push(vehicle);
        }

        Ok(groups
            .into_iter()
            .map(|(brand, vehicles)| HireCatalogGroup {
                brand,
                count: vehicles.len(),
                vehicles,
            })
            .collect())
    }

    async fn get_rental(&self, rental_id: &str) -> Result<Rental, AppError> {
        self.db
            .rentals
            .get(rental_id)
            .await
            .ok_or_else(AppError::rental_not_found)
    }

    async fn list_rentals(
        &self,
        status: Option<RentalStatus>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Rental>, AppError> {
        let mut rentals = self
            .db
            .rentals
            .find(|r| status.as_ref().map_or(true, |s| r.status == *s))
            .await;
        rentals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_sorted(rentals, page, limit))
    }
}
