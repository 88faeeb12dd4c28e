// src/services/trip_service.rs
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::{
        message::{Message, SendMessageRequest},
        trip::{
            RatingRequest, StopRequest, Trip, TripRating, TripStatus, TripStop, TripStopStatus,
            UpdateTripRequest,
        },
        vehicle::VehicleStatus,
    },
    services::{
        dispatch_service::fare_for,
        geolocation_service::Geolocator,
        payment_service::{PaymentOperations, PaymentService},
        realtime_service::{Realtime, RealtimeEvent},
    },
    store::{Database, Page},
    utils::id_generator::{IdGenerator, IdType, WithGeneratedId},
};

/// Every state transition is a single conditional update keyed by trip
/// id, expected status and acting party. A miss of any of the three
/// reads the same from outside: "trip not found".
#[async_trait]
pub trait TripOperations: Send + Sync {
    async fn update_trip(
        &self,
        user_id: &str,
        trip_id: &str,
        request: UpdateTripRequest,
    ) -> Result<Trip, AppError>;
    async fn announce_arrival(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError>;
    async fn begin_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError>;
    async fn end_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError>;
    async fn cancel_trip(
        &self,
        user_id: &str,
        trip_id: &str,
        reason: Option<String>,
    ) -> Result<Trip, AppError>;
    async fn rate_trip(
        &self,
        rider_id: &str,
        trip_id: &str,
        rating: RatingRequest,
    ) -> Result<Trip, AppError>;
    async fn update_stops(
        &self,
        user_id: &str,
        trip_id: &str,
        stops: Vec<StopRequest>,
    ) -> Result<Trip, AppError>;
    async fn get_trip_history(
        &self,
        rider_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<Trip>, AppError>;
    async fn send_message(
        &self,
        user_id: &str,
        trip_id: &str,
        request: SendMessageRequest,
    ) -> Result<Message, AppError>;
    async fn get_messages(&self, user_id: &str, trip_id: &str) -> Result<Vec<Message>, AppError>;
    async fn get_trip(&self, trip_id: &str) -> Result<Trip, AppError>;
    async fn list_trips(
        &self,
        status: Option<TripStatus>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Trip>, AppError>;
}

pub struct TripService {
    db: Arc<Database>,
    geolocator: Arc<dyn Geolocator>,
    payment_service: Arc<PaymentService>,
    realtime: Arc<dyn Realtime>,
}

impl TripService {
    pub fn new(
        db: Arc<Database>,
        geolocator: Arc<dyn Geolocator>,
        payment_service: Arc<PaymentService>,
        realtime: Arc<dyn Realtime>,
    ) -> Self {
        Self {
            db,
            geolocator,
            payment_service,
            realtime,
        }
    }

    async fn notify_parties(&self, trip: &Trip, event: RealtimeEvent) {
        match serde_json::to_value(trip) {
            Ok(payload) => {
                self.realtime.emit(&trip.rider_id, event, payload.clone()).await;
                self.realtime.emit(&trip.driver_id, event, payload).await;
            }
            Err(e) => {
                tracing::warn!("Failed to serialize trip {} for broadcast: {}", trip.id, e);
            }
        }
    }

    async fn release_vehicle(&self, vehicle_id: &str) {
        self.db
            .vehicles
            .update_one(
                |v| v.id == vehicle_id,
                |v| {
                    v.status = VehicleStatus::Online;
                    v.updated_at = Utc::now();
                },
            )
            .await;
    }
}

#[async_trait]
impl TripOperations for TripService {
    async fn update_trip(
        &self,
        user_id: &str,
        trip_id: &str,
        request: UpdateTripRequest,
    ) -> Result<Trip, AppError> {
        if !IdGenerator::validate_id(trip_id, Some(IdType::Trip)) {
            return Err(AppError::trip_not_found());
        }

        if let Some(status) = request.status {
            return match status {
                TripStatus::DriverArrived => self.announce_arrival(user_id, trip_id).await,
                TripStatus::InProgress => self.begin_trip(user_id, trip_id).await,
                TripStatus::Completed => self.end_trip(user_id, trip_id).await,
                _ => Err(AppError::bad_request("trip not updated")),
            };
        }
        if let Some(rating) = request.rating {
            return self.rate_trip(user_id, trip_id, rating).await;
        }
        if let Some(stops) = request.stops {
            return self.update_stops(user_id, trip_id, stops).await;
        }

        Err(AppError::bad_request("trip not updated"))
    }

    async fn announce_arrival(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError> {
        tracing::info!("Driver {} announcing arrival for trip {}", driver_id, trip_id);

        let updated = self
            .db
            .trips
            .update_one(
                |t| {
                    t.id == trip_id
                        && t.driver_id == driver_id
                        && t.status == TripStatus::Started
                        && !t.deleted
                },
                |t| {
                    t.status = TripStatus::DriverArrived;
                    t.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(AppError::trip_not_found)?;

        self.notify_parties(&updated, RealtimeEvent::DriverArrived).await;
        Ok(updated)
    }

    async fn begin_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError> {
        tracing::info!("Driver {} starting trip {}", driver_id, trip_id);

        let updated = self
            .db
            .trips
            .update_one(
                |t| {
                    t.id == trip_id
                        && t.driver_id == driver_id
                        && t.status == TripStatus::DriverArrived
                        && !t.deleted
                },
                |t| {
                    t.status = TripStatus::InProgress;
                    t.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(AppError::trip_not_found)?;

        self.notify_parties(&updated, RealtimeEvent::TripInProgress).await;
        Ok(updated)
    }

    async fn end_trip(&self, driver_id: &str, trip_id: &str) -> Result<Trip, AppError> {
        tracing::info!("Driver {} ending trip {}", driver_id, trip_id);

        let trip = self
            .db
            .trips
            .find_one(|t| {
                t.id == trip_id
                    && t.driver_id == driver_id
                    && t.status == TripStatus::InProgress
                    && !t.deleted
            })
            .await
            .ok_or_else(AppError::trip_not_found)?;

        // Requote from the distance actually covered, stops included
        let final_distance = trip.final_distance_m();
        let amount = match self.db.vehicles.get(&trip.vehicle_id).await {
            Some(vehicle) => fare_for(&vehicle.vehicle_type, final_distance).unwrap_or(trip.amount),
            None => trip.amount,
        };

        let settlement = self
            .payment_service
            .charge(&trip.rider_id, amount, &trip.payment_method)
            .await;

        let updated = match settlement {
            Ok(receipt) => {
                self.db
                    .trips
                    .update_one(
                        |t| t.id == trip_id && t.status == TripStatus::InProgress,
                        |t| {
                            t.status = TripStatus::Completed;
                            t.amount = amount;
                            t.meta = Some(json!({ "paymentResponse": receipt }));
                            t.updated_at = Utc::now();
                        },
                    )
                    .await
            }
            Err(error) => {
                tracing::warn!("Settlement failed for trip {}: {}", trip_id, error);
                let message = error.to_string();
                self.db
                    .trips
                    .update_one(
                        |t| t.id == trip_id && t.status == TripStatus::InProgress,
                        |t| {
                            t.status = TripStatus::PaymentFailed;
                            t.amount = amount;
                            t.meta = Some(json!({ "paymentError": message }));
                            t.updated_at = Utc::now();
                        },
                    )
                    .await
            }
        };
        let updated = updated.ok_or_else(AppError::trip_not_found)?;

        // The driver is free again whichever way settlement went
        self.release_vehicle(&updated.vehicle_id).await;

        let event = match updated.status {
            TripStatus::Completed => RealtimeEvent::TripEnded,
            _ => RealtimeEvent::PaymentFailed,
        };
        self.notify_parties(&updated, event).await;

        tracing::info!("Trip {} settled as {:?}", trip_id, updated.status);
        Ok(updated)
    }

    async fn cancel_trip(
        &self,
        user_id: &str,
        trip_id: &str,
        reason: Option<String>,
    ) -> Result<Trip, AppError> {
        if !IdGenerator::validate_id(trip_id, Some(IdType::Trip)) {
            return Err(AppError::trip_not_found());
        }

        tracing::info!("User {} cancelling trip {}", user_id, trip_id);

        let updated = self
            .db
            .trips
            .update_one(
                |t| {
                    t.id == trip_id
                        && t.is_party(user_id)
                        && matches!(t.status, TripStatus::Started | TripStatus::DriverArrived)
                        && !t.deleted
                },
                |t| {
                    t.status = TripStatus::Cancelled;
                    t.cancellation_reason = reason;
                    t.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(AppError::trip_not_found)?;

        self.release_vehicle(&updated.vehicle_id).await;
        self.notify_parties(&updated, RealtimeEvent::TripCancelled).await;
        Ok(updated)
    }

    async fn rate_trip(
        &self,
        rider_id: &str,
        trip_id: &str,
        rating: RatingRequest,
    ) -> Result<Trip, AppError> {
        if !(1..=5).contains(&rating.score) {
            return Err(AppError::bad_request("rating must be between 1 and 5"));
        }

        tracing::info!("Rider {} rating trip {}", rider_id, trip_id);

        // Rider only, settled trips only, one rating ever
        let updated = self
            .db
            .trips
            .update_one(
                |t| {
                    t.id == trip_id
                        && t.rider_id == rider_id
                        && matches!(t.status, TripStatus::Completed | TripStatus::PaymentFailed)
                        && t.rating.is_none()
                },
                |t| {
                    t.rating = Some(TripRating {
                        score: rating.score,
                        comment: rating.comment,
                    });
                    t.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(AppError::trip_not_found)?;

        Ok(updated)
    }

    async fn update_stops(
        &self,
        user_id: &str,
        trip_id: &str,
        stops: Vec<StopRequest>,
    ) -> Result<Trip, AppError> {
        tracing::info!("User {} replacing stops on trip {}", user_id, trip_id);

        let active = |status: &TripStatus| {
            matches!(
                status,
                TripStatus::Started | TripStatus::DriverArrived | TripStatus::InProgress
            )
        };

        let trip = self
            .db
            .trips
            .find_one(|t| t.id == trip_id && t.is_party(user_id) && active(&t.status) && !t.deleted)
            .await
            .ok_or_else(AppError::trip_not_found)?;

        // Stops already served are history; only the remainder is replaced
        let mut rebuilt: Vec<TripStop> = trip
            .stops
            .iter()
            .filter(|s| s.status == TripStopStatus::Completed)
            .cloned()
            .collect();
        let mut previous = rebuilt
            .last()
            .map(|s| s.location.clone())
            .unwrap_or_else(|| trip.from.clone());
        for stop in &stops {
            let distance_m = self.geolocator.road_distance_m(&previous, &stop.location).await?;
            rebuilt.push(TripStop {
                location: stop.location.clone(),
                address: stop.address.clone(),
                status: TripStopStatus::Pending,
                distance_m,
            });
            previous = stop.location.clone();
        }

        let updated = self
            .db
            .trips
            .update_one(
                |t| t.id == trip_id && t.is_party(user_id) && active(&t.status) && !t.deleted,
                |t| {
                    t.stops = rebuilt;
                    t.updated_at = Utc::now();
                },
            )
            .await
            .ok_or_else(AppError::trip_not_found)?;

        Ok(updated)
    }

    async fn get_trip_history(
        &self,
        rider_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<Trip>, AppError> {
        tracing::debug!("Fetching trip history for rider {}", rider_id);

        let mut trips = self.db.trips.find(|t| t.rider_id == rider_id && !t.deleted).await;
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_sorted(trips, page, limit))
    }

    async fn send_message(
        &self,
        user_id: &str,
        trip_id: &str,
        request: SendMessageRequest,
    ) -> Result<Message, AppError> {
        let trip = self
            .db
            .trips
            .find_one(|t| t.id == trip_id && t.is_party(user_id) && !t.deleted)
            .await
            .ok_or_else(AppError::trip_not_found)?;

        let now = Utc::now();
        let mut message = Message {
            id: String::new(),
            trip_id: trip.id.clone(),
            sender_id: user_id.to_string(),
            text: request.text,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        message.set_generated_id(IdType::Message);
        self.db.messages.insert(&message.id, message.clone()).await;

        match serde_json::to_value(&message) {
            Ok(payload) => {
                self.realtime
                    .emit(&trip.rider_id, RealtimeEvent::NewMessage, payload.clone())
                    .await;
                self.realtime
                    .emit(&trip.driver_id, RealtimeEvent::NewMessage, payload)
                    .await;
            }
            Err(e) => {
                tracing::warn!("Failed to serialize message {} for broadcast: {}", message.id, e);
            }
        }

        Ok(message)
    }

    async fn get_messages(&self, user_id: &str, trip_id: &str) -> Result<Vec<Message>, AppError> {
        let trip = self
            .db
            .trips
            .find_one(|t| t.id == trip_id && t.is_party(user_id) && !t.deleted)
            .await
            .ok_or_else(AppError::trip_not_found)?;

        let mut messages = self.db.messages.find(|m| m.trip_id == trip.id && !m.deleted).await;
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn get_trip(&self, trip_id: &str) -> Result<Trip, AppError> {
        self.db
            .trips
            .get(trip_id)
            .await
            .ok_or_else(AppError::trip_not_found)
    }

    async fn list_trips(
        &self,
        status: Option<TripStatus>,
        page: u32,
        limit: u32,
    ) -> Result<Page<Trip>, AppError> {
        let mut trips = self
            .db
            .trips
            .find(|t| status.as_ref().map_or(true, |s| t.status == *s))
            .await;
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_sorted(trips, page, limit))
    }
}
