// src/services/geolocation_service.rs
use async_trait::async_trait;
use serde::Deserialize;
use tracing;

use crate::errors::DispatchError as AppError;
use crate::models::vehicle::GeoPoint;

/// Road distance and ETA lookups. Dispatch quotes fares off road
/// distance, not straight-line distance, so this sits behind every
/// trip request.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn road_distance_m(&self, from: &GeoPoint, to: &GeoPoint) -> Result<f64, AppError>;
    async fn eta_minutes(&self, from: &GeoPoint, to: &GeoPoint) -> Result<u32, AppError>;
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    rows: Vec<DistanceMatrixRow>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixRow {
    elements: Vec<DistanceMatrixElement>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: f64, // meters for distance, seconds for duration
}

pub struct GoogleGeolocator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeolocator {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn lookup(
        &self,
        from: &GeoPoint,
        to: &GeoPoint,
        context: &str,
    ) -> Result<DistanceMatrixElement, AppError> {
        let url = format!("{}/maps/api/distancematrix/json", self.base_url);
        tracing::debug!("Distance matrix lookup: {},{} -> {},{}",
            from.latitude, from.longitude, to.latitude, to.longitude);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("origins", format!("{},{}", from.latitude, from.longitude)),
                ("destinations", format!("{},{}", to.latitude, to.longitude)),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("error getting {} - {}", context, e)))?;

        let matrix: DistanceMatrixResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("error getting {} - {}", context, e)))?;

        if matrix.status != "OK" {
            return Err(AppError::upstream(format!(
                "error getting {} - {}",
                context, matrix.status
            )));
        }

        let element = matrix
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| {
                AppError::upstream(format!("error getting {} - empty matrix", context))
            })?;

        if element.status != "OK" {
            return Err(AppError::upstream(format!(
                "error getting {} - {}",
                context, element.status
            )));
        }

        Ok(element)
    }
}

#[async_trait]
impl Geolocator for GoogleGeolocator {
    async fn road_distance_m(&self, from: &GeoPoint, to: &GeoPoint) -> Result<f64, AppError> {
        let element = self.lookup(from, to, "distance").await?;
        element
            .distance
            .map(|d| d.value)
            .ok_or_else(|| AppError::upstream("error getting distance - missing value".to_string()))
    }

    async fn eta_minutes(&self, from: &GeoPoint, to: &GeoPoint) -> Result<u32, AppError> {
        let element = self.lookup(from, to, "eta").await?;
        let seconds = element
            .duration
            .map(|d| d.value)
            .ok_or_else(|| AppError::upstream("error getting eta - missing value".to_string()))?;
        Ok((seconds / 60.0).ceil() as u32)
    }
}

/// Fixed-value geolocator used when the upstream lookup is switched off
/// by config, and in tests.
pub struct StaticGeolocator {
    pub distance_m: f64,
    pub eta_min: u32,
}

impl Default for StaticGeolocator {
    fn default() -> Self {
        Self {
            distance_m: 3_000.0,
            eta_min: 5,
        }
    }
}

#[async_trait]
impl Geolocator for StaticGeolocator {
    async fn road_distance_m(&self, _from: &GeoPoint, _to: &GeoPoint) -> Result<f64, AppError> {
        Ok(self.distance_m)
    }

    async fn eta_minutes(&self, _from: &GeoPoint, _to: &GeoPoint) -> Result<u32, AppError> {
        Ok(self.eta_min)
    }
}
