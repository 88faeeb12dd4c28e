// src/handlers/mod.rs
use axum::{extract::FromRequestParts, http::request::Parts, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{errors::DispatchError as AppError, store::Page};

pub mod admin_handler;
pub mod rental_handler;
pub mod ride_handler;
pub mod ws_handler;

/// Response envelope shared by every endpoint: a human-readable message,
/// the payload, and pagination metadata where it applies.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn json(message: &str, data: T) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            data: Some(data),
            meta: None,
        })
    }

    pub fn paginated(message: &str, page: Page<T>) -> Json<ApiResponse<Vec<T>>> {
        Json(ApiResponse {
            message: message.to_string(),
            data: Some(page.items),
            meta: Some(json!({
                "total": page.total,
                "page": page.page,
                "limit": page.limit,
            })),
        })
    }
}

impl ApiResponse<()> {
    pub fn plain(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            data: None,
            meta: None,
        })
    }
}

/// Caller identity from the `x-user-id` header. Session verification
/// lives upstream at the gateway, the engine only needs the id.
pub struct CurrentUser(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::unauthorized("missing x-user-id header"))?;

        Ok(CurrentUser(user_id.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct TrackingQuery {
    #[serde(rename = "trackingId")]
    pub tracking_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_limit() -> u32 {
    100
}
