// src/handlers/rental_handler.rs
use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    errors::DispatchError as AppError,
    handlers::{ApiResponse, CurrentUser},
    models::{
        rental::{HireVehicleRequest, Rental},
        vehicle::HireCatalogGroup,
    },
    services::rental_service::RentalOperations,
    state::AppState,
};

pub async fn hire_vehicle(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<HireVehicleRequest>,
) -> Result<Json<ApiResponse<Rental>>, AppError> {
    let rental = state.rental_service.hire_vehicle(&user, payload).await?;
    Ok(ApiResponse::json("vehicle hired", rental))
}

pub async fn get_ongoing_rental(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Rental>>, AppError> {
    let rental = state.rental_service.get_ongoing_rental(&user).await?;
    Ok(ApiResponse::json("ongoing rental", rental))
}

pub async fn get_hire_catalog(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<HireCatalogGroup>>>, AppError> {
    let catalog = state.rental_service.get_hire_catalog().await?;
    Ok(ApiResponse::json("hire catalog", catalog))
}
