// src/handlers/ride_handler.rs
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    errors::DispatchError as AppError,
    handlers::{ApiResponse, CurrentUser, PaginationQuery, TrackingQuery},
    models::{
        message::{Message, SendMessageRequest},
        trip::{
            OngoingTripResponse, QuoteResponse, RequestTripRequest, RequestTripResponse, Trip,
            UpdateTripRequest,
        },
        vehicle::{
            AvailableVehiclesQuery, RegisterVehicleRequest, UpdateVehicleStatusRequest, Vehicle,
        },
    },
    services::{
        dispatch_service::{quote_fares, DispatchOperations},
        trip_service::TripOperations,
        vehicle_service::VehicleOperations,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub distance: f64,
}

#[derive(Debug, Deserialize)]
pub struct CancelTripQuery {
    pub reason: Option<String>,
}

pub async fn get_available_rides(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<AvailableVehiclesQuery>,
) -> Result<Json<ApiResponse<Vec<Vehicle>>>, AppError> {
    let rides = state.dispatch_service.get_available_vehicles(query).await?;
    Ok(ApiResponse::json("available rides", rides))
}

pub async fn get_ride_quotes(
    _user: CurrentUser,
    Query(query): Query<QuoteQuery>,
) -> Json<ApiResponse<QuoteResponse>> {
    ApiResponse::json("ride quotes", quote_fares(query.distance))
}

pub async fn register_vehicle(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<RegisterVehicleRequest>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.vehicle_service.register_vehicle(&user, payload).await?;
    Ok(ApiResponse::json("vehicle registered", vehicle))
}

pub async fn get_own_vehicles(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Vehicle>>>, AppError> {
    let vehicles = state.vehicle_service.get_own_vehicles(&user).await?;
    Ok(ApiResponse::json("vehicles", vehicles))
}

pub async fn update_vehicle_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(vehicle): Path<String>,
    Json(payload): Json<UpdateVehicleStatusRequest>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state
        .vehicle_service
        .set_status(&user, &vehicle, payload.status)
        .await?;
    Ok(ApiResponse::json("vehicle status updated", vehicle))
}

pub async fn remove_vehicle(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(vehicle): Path<String>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.vehicle_service.remove_vehicle(&user, &vehicle).await?;
    Ok(ApiResponse::json("vehicle removed", vehicle))
}

pub async fn request_ride(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<RequestTripRequest>,
) -> Result<Json<ApiResponse<RequestTripResponse>>, AppError> {
    let driver = state.dispatch_service.request_ride(&user, payload).await?;
    Ok(ApiResponse::json("Connecting you to driver", driver))
}

pub async fn accept_ride_request(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<TrackingQuery>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.dispatch_service.accept_ride(&query.tracking_id).await?;
    Ok(ApiResponse::plain("Accepting ride request"))
}

pub async fn cancel_ride_request(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TrackingQuery>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .dispatch_service
        .cancel_connection(&user, &query.tracking_id)
        .await?;
    Ok(ApiResponse::plain("Cancelling ride request"))
}

pub async fn get_trips(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<Trip>>>, AppError> {
    let page = state
        .trip_service
        .get_trip_history(&user, query.page, query.limit)
        .await?;
    Ok(ApiResponse::paginated("trips", page))
}

pub async fn get_ongoing_trip(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<OngoingTripResponse>>, AppError> {
    let ongoing = state.dispatch_service.get_ongoing_trip(&user).await?;
    Ok(ApiResponse::json("ongoing trip", ongoing))
}

pub async fn update_trip(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(trip): Path<String>,
    Json(payload): Json<UpdateTripRequest>,
) -> Result<Json<ApiResponse<Trip>>, AppError> {
    let trip = state.trip_service.update_trip(&user, &trip, payload).await?;
    Ok(ApiResponse::json("trip updated", trip))
}

pub async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(trip): Path<String>,
    Query(query): Query<CancelTripQuery>,
) -> Result<Json<ApiResponse<Trip>>, AppError> {
    let trip = state
        .trip_service
        .cancel_trip(&user, &trip, query.reason)
        .await?;
    Ok(ApiResponse::json("Trip cancelled", trip))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(trip): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<Message>>, AppError> {
    let message = state.trip_service.send_message(&user, &trip, payload).await?;
    Ok(ApiResponse::json("Message sent", message))
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(trip): Path<String>,
) -> Result<Json<ApiResponse<Vec<Message>>>, AppError> {
    let messages = state.trip_service.get_messages(&user, &trip).await?;
    Ok(ApiResponse::json("Trip messages", messages))
}
