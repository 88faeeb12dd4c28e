// src/services/dispatch_service.rs
use async_trait::async_trait;
use chrono::Utc;
use nanoid::nanoid;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::{
        trip::{
            OngoingTripResponse, PaymentMethod, QuoteResponse, RequestTripRequest,
            RequestTripResponse, StopRequest, Trip, TripStatus, TripStop, TripStopStatus,
        },
        vehicle::{AvailableVehiclesQuery, GeoPoint, Vehicle, VehicleStatus, VehicleType},
    },
    services::{
        cache_service::{CacheKeys, CoordinationStore},
        geolocation_service::Geolocator,
        payment_service::{PaymentOperations, PaymentService},
        realtime_service::{Realtime, RealtimeEvent},
    },
    store::Database,
    utils::id_generator::{IdType, WithGeneratedId},
};

pub const CLASSIC_RATE_PER_KM: i64 = 85;
pub const CLASSIC_MINIMUM_FARE: i64 = 700;
pub const LUXURY_RATE_PER_KM: i64 = 100;
pub const LUXURY_MINIMUM_FARE: i64 = 800;

fn fare(rate_per_km: i64, minimum: i64, distance_m: f64) -> i64 {
    let metered = (rate_per_km as f64 * distance_m / 1000.0).round() as i64;
    metered.max(minimum)
}

/// One quote per tier for a given road distance. The same function
/// prices ad-hoc quote requests, trip requests and final settlement.
pub fn quote_fares(distance_m: f64) -> QuoteResponse {
    QuoteResponse {
        classic: fare(CLASSIC_RATE_PER_KM, CLASSIC_MINIMUM_FARE, distance_m),
        luxury: fare(LUXURY_RATE_PER_KM, LUXURY_MINIMUM_FARE, distance_m),
    }
}

/// Fare for a single tier. Hire vehicles are not metered, they are
/// booked through the rental flow.
pub fn fare_for(vehicle_type: &VehicleType, distance_m: f64) -> Option<i64> {
    match vehicle_type {
        VehicleType::Classic => Some(fare(CLASSIC_RATE_PER_KM, CLASSIC_MINIMUM_FARE, distance_m)),
        VehicleType::Luxury => Some(fare(LUXURY_RATE_PER_KM, LUXURY_MINIMUM_FARE, distance_m)),
        VehicleType::Hire => None,
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub wait_window_ms: u64,
    pub search_radius_m: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            wait_window_ms: 10_000,
            search_radius_m: 5_000.0,
        }
    }
}

#[async_trait]
pub trait DispatchOperations: Send + Sync {
    async fn request_ride(
        &self,
        rider_id: &str,
        request: RequestTripRequest,
    ) -> Result<RequestTripResponse, AppError>;
    async fn accept_ride(&self, tracking_id: &str) -> Result<(), AppError>;
    async fn cancel_connection(&self, rider_id: &str, tracking_id: &str) -> Result<(), AppError>;
    async fn get_ongoing_trip(&self, rider_id: &str) -> Result<OngoingTripResponse, AppError>;
    async fn get_available_vehicles(
        &self,
        query: AvailableVehiclesQuery,
    ) -> Result<Vec<Vehicle>, AppError>;
    async fn driver_eta(&self, rider_id: &str) -> Result<Option<(u32, GeoPoint)>, AppError>;
}

#[derive(Clone)]
pub struct DispatchService {
    db: Arc<Database>,
    cache: Arc<dyn CoordinationStore>,
    geolocator: Arc<dyn Geolocator>,
    payment_service: Arc<PaymentService>,
    realtime: Arc<dyn Realtime>,
    config: DispatchConfig,
}

impl DispatchService {
    pub fn new(
        db: Arc<Database>,
        cache: Arc<dyn CoordinationStore>,
        geolocator: Arc<dyn Geolocator>,
        payment_service: Arc<PaymentService>,
        realtime: Arc<dyn Realtime>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            db,
            cache,
            geolocator,
            payment_service,
            realtime,
            config,
        }
    }

    /// Idle drivers are offered rides before drivers still finishing a
    /// trip; within each group the nearest vehicle goes first.
    fn rank_candidates(vehicles: &mut [Vehicle], pickup: &GeoPoint) {
        vehicles.sort_by(|a, b| {
            let rank = |v: &Vehicle| match v.status {
                VehicleStatus::Online => 0,
                _ => 1,
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.location.distance_m(pickup).total_cmp(&b.location.distance_m(pickup)))
        });
    }

    async fn find_candidates(&self, pickup: &GeoPoint, vehicle_type: &VehicleType) -> Vec<Vehicle> {
        let mut candidates = self
            .db
            .vehicles
            .find(|v| {
                !v.deleted
                    && v.status.is_dispatchable()
                    && v.vehicle_type == *vehicle_type
                    && v.location.distance_m(pickup) <= self.config.search_radius_m
            })
            .await;
        Self::rank_candidates(&mut candidates, pickup);
        candidates
    }

    /// Stop legs are measured up front so the final fare is a pure sum
    /// at settlement time.
    async fn prepare_stops(
        &self,
        from: &GeoPoint,
        stops: &[StopRequest],
    ) -> Result<Vec<TripStop>, AppError> {
        let mut prepared = Vec::with_capacity(stops.len());
        let mut previous = from.clone();
        for stop in stops {
            let distance_m = self.geolocator.road_distance_m(&previous, &stop.location).await?;
            prepared.push(TripStop {
                location: stop.location.clone(),
                address: stop.address.clone(),
                status: TripStopStatus::Pending,
                distance_m,
            });
            previous = stop.location.clone();
        }
        Ok(prepared)
    }

    async fn clear_negotiation_keys(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.cache.delete(key).await {
                tracing::warn!("Failed to clear negotiation key {}: {}", key, e);
            }
        }
    }

    /// Walks the candidate list, one time-boxed offer at a time. Runs as
    /// a detached task; every outcome is reported over the realtime
    /// channel rather than a return value.
    async fn negotiate(
        &self,
        rider_id: String,
        tracking_id: String,
        candidates: Vec<Vehicle>,
        request: RequestTripRequest,
        stops: Vec<TripStop>,
        amount: i64,
        distance_m: f64,
    ) {
        let connection_key = CacheKeys::rider_connection(&rider_id);
        let tracking_key = CacheKeys::tracking(&tracking_id);
        let total = candidates.len();
        let rider = self.db.users.get(&rider_id).await;

        for (index, vehicle) in candidates.into_iter().enumerate() {
            let offer_token = nanoid!();
            let offer_key = CacheKeys::tracking(&offer_token);

            tracing::info!(
                "Offering request {} to driver {} ({} of {})",
                tracking_id,
                vehicle.driver_id,
                index + 1,
                total
            );

            // The connection entries must outlive the rest of the walk,
            // however long this iteration was delayed
            let remaining_ttl = self.config.wait_window_ms * (total - index) as u64 * 2;
            let prepared = async {
                self.cache.expire(&tracking_key, remaining_ttl).await?;
                self.cache.expire(&connection_key, remaining_ttl).await?;
                self.cache.set(&offer_key, "false", self.config.wait_window_ms).await
            };
            if let Err(e) = prepared.await {
                tracing::error!("Negotiation for {} aborted on cache error: {}", tracking_id, e);
                self.clear_negotiation_keys(&[&connection_key, &tracking_key]).await;
                return;
            }

            self.realtime
                .emit(
                    &rider_id,
                    RealtimeEvent::ConnectingToDriver,
                    json!({ "ride": &vehicle, "trackingId": &tracking_id }),
                )
                .await;
            self.realtime
                .emit(
                    &vehicle.driver_id,
                    RealtimeEvent::RideRequest,
                    json!({
                        "trackingId": &offer_token,
                        "user": &rider,
                        "request": &request,
                        "amount": amount,
                    }),
                )
                .await;

            tokio::time::sleep(Duration::from_millis(self.config.wait_window_ms)).await;

            let (offer, connection) = match tokio::join!(
                self.cache.get(&offer_key),
                self.cache.get(&tracking_key),
            ) {
                (Ok(offer), Ok(connection)) => (offer, connection),
                (offer, connection) => {
                    let error = offer.err().or(connection.err());
                    tracing::error!(
                        "Negotiation for {} aborted reading tokens: {:?}",
                        tracking_id,
                        error
                    );
                    self.clear_negotiation_keys(&[&connection_key, &tracking_key, &offer_key])
                        .await;
                    return;
                }
            };

            if !matches!(connection.as_deref(), Some("true")) {
                tracing::info!("Request {} withdrawn by rider, stopping the walk", tracking_id);
                // Each side is told under the handle it knows
                self.realtime
                    .emit(
                        &rider_id,
                        RealtimeEvent::RideRequestCancelled,
                        json!({ "trackingId": &tracking_id }),
                    )
                    .await;
                self.realtime
                    .emit(
                        &vehicle.driver_id,
                        RealtimeEvent::RideRequestCancelled,
                        json!({ "trackingId": &offer_token }),
                    )
                    .await;
                self.clear_negotiation_keys(&[&connection_key, &tracking_key, &offer_key])
                    .await;
                return;
            }

            if matches!(offer.as_deref(), Some("true")) {
                tracing::info!("Driver {} accepted request {}", vehicle.driver_id, tracking_id);

                let now = Utc::now();
                let mut trip = Trip {
                    id: String::new(),
                    rider_id: rider_id.clone(),
                    driver_id: vehicle.driver_id.clone(),
                    vehicle_id: vehicle.id.clone(),
                    payment_method: request.payment_method.clone(),
                    amount,
                    from: request.from.clone(),
                    from_address: request.from_address.clone(),
                    to: request.to.clone(),
                    to_address: request.to_address.clone(),
                    stops: stops.clone(),
                    distance_m,
                    status: TripStatus::Started,
                    cancellation_reason: None,
                    rating: None,
                    meta: None,
                    deleted: false,
                    created_at: now,
                    updated_at: now,
                };
                trip.set_generated_id(IdType::Trip);
                self.db.trips.insert(&trip.id, trip.clone()).await;

                self.db
                    .vehicles
                    .update_one(
                        |v| v.id == vehicle.id,
                        |v| {
                            v.status = VehicleStatus::Busy;
                            v.updated_at = Utc::now();
                        },
                    )
                    .await;

                self.clear_negotiation_keys(&[&connection_key, &tracking_key, &offer_key])
                    .await;

                match serde_json::to_value(&trip) {
                    Ok(payload) => {
                        self.realtime
                            .emit(&rider_id, RealtimeEvent::TripStarted, payload.clone())
                            .await;
                        self.realtime
                            .emit(&trip.driver_id, RealtimeEvent::TripStarted, payload)
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to serialize trip {} for broadcast: {}", trip.id, e);
                    }
                }
                return;
            }

            // No answer inside the window, move on
        }

        tracing::info!("Every candidate passed on request {}", tracking_id);
        self.clear_negotiation_keys(&[&connection_key, &tracking_key]).await;
        self.realtime
            .emit(
                &rider_id,
                RealtimeEvent::DriversBusy,
                json!("All drivers are busy at this time"),
            )
            .await;
    }
}

#[async_trait]
impl DispatchOperations for DispatchService {
    async fn request_ride(
        &self,
        rider_id: &str,
        request: RequestTripRequest,
    ) -> Result<RequestTripResponse, AppError> {
        tracing::info!("Ride requested by user: {}", rider_id);

        let connection_key = CacheKeys::rider_connection(rider_id);
        let (ongoing, pending) = tokio::join!(
            self.db
                .trips
                .find_one(|t| t.rider_id == rider_id && !t.status.is_terminal() && !t.deleted),
            self.cache.get(&connection_key),
        );
        if ongoing.is_some() {
            return Err(AppError::conflict("another trip currently ongoing"));
        }
        if pending?.is_some() {
            return Err(AppError::conflict("previous request still pending"));
        }

        let (mut candidates, distance) = tokio::join!(
            self.find_candidates(&request.from, &request.vehicle_type),
            self.geolocator.road_distance_m(&request.from, &request.to),
        );
        let distance_m = distance?;

        let amount = fare_for(&request.vehicle_type, distance_m)
            .ok_or_else(|| AppError::bad_request("hire vehicles are booked as rentals"))?;

        // Fail the request before any driver is contacted
        match request.payment_method {
            PaymentMethod::RulBalance => {
                let balance = self.payment_service.get_balance(rider_id).await?;
                if balance.amount < amount {
                    return Err(AppError::bad_request("insufficient RUL balance"));
                }
            }
            PaymentMethod::Card => {
                if self.payment_service.default_card(rider_id).await?.is_none() {
                    return Err(AppError::bad_request("no/invalid card setup"));
                }
            }
            PaymentMethod::Cash => {}
        }

        if candidates.is_empty() {
            tracing::info!("No dispatchable vehicle near user {}", rider_id);
            return Err(AppError::bad_request("All drivers are busy at this time"));
        }

        let stops = match &request.stops {
            Some(stops) => self.prepare_stops(&request.from, stops).await?,
            None => Vec::new(),
        };

        let tracking_id = nanoid!();
        let candidate_count = candidates.len();
        // Entries live for the whole worst-case walk; the loop re-arms
        // them on every iteration
        let ttl_ms = self.config.wait_window_ms * candidate_count as u64 * 2;
        self.cache.set(&CacheKeys::tracking(&tracking_id), "true", ttl_ms).await?;
        self.cache.set(&connection_key, &tracking_id, ttl_ms).await?;

        let top_candidate = candidates[0].clone();

        tracing::info!(
            "Request {} queued for {} candidate(s), first driver {}",
            tracking_id,
            candidate_count,
            top_candidate.driver_id
        );

        let service = self.clone();
        let loop_rider = rider_id.to_string();
        let loop_tracking = tracking_id.clone();
        tokio::spawn(async move {
            service
                .negotiate(
                    loop_rider,
                    loop_tracking,
                    candidates,
                    request,
                    stops,
                    amount,
                    distance_m,
                )
                .await;
        });

        Ok(RequestTripResponse {
            ride: top_candidate,
            tracking_id,
        })
    }

    async fn accept_ride(&self, tracking_id: &str) -> Result<(), AppError> {
        tracing::info!("Offer acceptance for token: {}", tracking_id);
        let accepted = self
            .cache
            .set_if_exists(&CacheKeys::tracking(tracking_id), "true", self.config.wait_window_ms)
            .await?;
        if !accepted {
            return Err(AppError::invalid_tracking_id());
        }
        Ok(())
    }

    async fn cancel_connection(&self, rider_id: &str, tracking_id: &str) -> Result<(), AppError> {
        tracing::info!("Cancelling pending request {} for user {}", tracking_id, rider_id);

        // Only the rider whose connection still holds this token may
        // cancel it
        let owned = self
            .cache
            .compare_and_delete(&CacheKeys::rider_connection(rider_id), tracking_id)
            .await?;
        if !owned {
            return Err(AppError::invalid_tracking_id());
        }

        self.cache
            .set(&CacheKeys::tracking(tracking_id), "false", self.config.wait_window_ms)
            .await?;
        Ok(())
    }

    async fn get_ongoing_trip(&self, rider_id: &str) -> Result<OngoingTripResponse, AppError> {
        if let Some(tracking_id) = self.cache.get(&CacheKeys::rider_connection(rider_id)).await? {
            return Ok(OngoingTripResponse {
                tracking_id: Some(tracking_id),
                trip: None,
            });
        }

        let trip = self
            .db
            .trips
            .find_one(|t| t.rider_id == rider_id && !t.status.is_terminal() && !t.deleted)
            .await
            .ok_or_else(|| AppError::not_found("no ongoing trip"))?;
        Ok(OngoingTripResponse {
            tracking_id: None,
            trip: Some(trip),
        })
    }

    async fn get_available_vehicles(
        &self,
        query: AvailableVehiclesQuery,
    ) -> Result<Vec<Vehicle>, AppError> {
        let pickup = GeoPoint::new(query.latitude, query.longitude);
        let radius = query.radius_m.unwrap_or(self.config.search_radius_m);

        let mut vehicles = self
            .db
            .vehicles
            .find(|v| {
                !v.deleted
                    && v.status.is_dispatchable()
                    && query.vehicle_type.as_ref().map_or(true, |t| v.vehicle_type == *t)
                    && v.location.distance_m(&pickup) <= radius
            })
            .await;
        Self::rank_candidates(&mut vehicles, &pickup);
        Ok(vehicles)
    }

    // Estimated arrival of the assigned vehicle for the rider's live
    // trip. Before pickup the target is the pickup point, afterwards
    // the last waypoint. None when the rider has no live trip.
    async fn driver_eta(&self, rider_id: &str) -> Result<Option<(u32, GeoPoint)>, AppError> {
        let trip = self
            .db
            .trips
            .find_one(|t| t.rider_id == rider_id && !t.status.is_terminal() && !t.deleted)
            .await;
        let Some(trip) = trip else {
            return Ok(None);
        };
        let Some(vehicle) = self.db.vehicles.get(&trip.vehicle_id).await else {
            return Ok(None);
        };

        let target = if trip.status == TripStatus::Started {
            trip.from.clone()
        } else {
            trip.final_destination().clone()
        };
        let eta = self.geolocator.eta_minutes(&vehicle.location, &target).await?;
        Ok(Some((eta, vehicle.location)))
    }
}
