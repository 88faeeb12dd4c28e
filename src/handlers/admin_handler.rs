// src/handlers/admin_handler.rs
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    errors::DispatchError as AppError,
    handlers::{ApiResponse, CurrentUser},
    models::{
        rental::{Rental, RentalStatus},
        trip::{Trip, TripStatus},
    },
    services::{rental_service::RentalOperations, trip_service::TripOperations},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct TripListQuery {
    pub status: Option<TripStatus>,
    #[serde(default = "super::default_page")]
    pub page: u32,
    #[serde(default = "super::default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct RentalListQuery {
    pub status: Option<RentalStatus>,
    #[serde(default = "super::default_page")]
    pub page: u32,
    #[serde(default = "super::default_limit")]
    pub limit: u32,
}

pub async fn get_trips(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<TripListQuery>,
) -> Result<Json<ApiResponse<Vec<Trip>>>, AppError> {
    let page = state
        .trip_service
        .list_trips(query.status, query.page, query.limit)
        .await?;
    Ok(ApiResponse::paginated("trips", page))
}

pub async fn get_rentals(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<RentalListQuery>,
) -> Result<Json<ApiResponse<Vec<Rental>>>, AppError> {
    let page = state
        .rental_service
        .list_rentals(query.status, query.page, query.limit)
        .await?;
    Ok(ApiResponse::paginated("rentals", page))
}

pub async fn get_trip(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(trip): Path<String>,
) -> Result<Json<ApiResponse<Trip>>, AppError> {
    let trip = state.trip_service.get_trip(&trip).await?;
    Ok(ApiResponse::json("trip", trip))
}

pub async fn get_rental(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(rental): Path<String>,
) -> Result<Json<ApiResponse<Rental>>, AppError> {
    let rental = state.rental_service.get_rental(&rental).await?;
    Ok(ApiResponse::json("rental", rental))
}
