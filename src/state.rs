// src/state.rs
use std::sync::Arc;

use crate::services::{
    cache_service::{CoordinationStore, MemoryStore, RedisStore},
    dispatch_service::{DispatchConfig, DispatchService},
    geolocation_service::{Geolocator, GoogleGeolocator, StaticGeolocator},
    payment_service::{ApprovingCardGateway, CardGateway, HttpCardGateway, PaymentService},
    realtime_service::{Realtime, WsHub},
    rental_service::RentalService,
    trip_service::TripService,
    vehicle_service::VehicleService,
};
use crate::store::Database;

pub struct AppState {
    pub db: Arc<Database>,
    pub hub: Arc<WsHub>,
    pub dispatch_service: Arc<DispatchService>,
    pub trip_service: Arc<TripService>,
    pub rental_service: Arc<RentalService>,
    pub vehicle_service: Arc<VehicleService>,
    pub payment_service: Arc<PaymentService>,
    pub config: AppConfig,
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub redis_url: Option<String>,
    pub maps_api_url: String,
    pub maps_api_key: Option<String>,
    pub geolocation_disabled: bool,
    pub payment_api_url: String,
    pub payment_secret_key: Option<String>,
    pub wait_window_ms: u64,
    pub search_radius_m: f64,
    pub finishing_radius_m: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            redis_url: std::env::var("REDIS_URL").ok(),
            maps_api_url: std::env::var("MAPS_API_URL")
                .unwrap_or_else(|_| "https://maps.googleapis.com".to_string()),
            maps_api_key: std::env::var("MAPS_API_KEY").ok(),
            geolocation_disabled: std::env::var("GEOLOCATION_DISABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            payment_api_url: std::env::var("PAYMENT_API_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            payment_secret_key: std::env::var("PAYMENT_SECRET_KEY").ok(),
            wait_window_ms: std::env::var("WAIT_WINDOW_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            search_radius_m: std::env::var("SEARCH_RADIUS_M")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5_000.0),
            finishing_radius_m: std::env::var("FINISHING_RADIUS_M")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000.0),
        }
    }
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(Database::default());

        let cache: Arc<dyn CoordinationStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisStore::new(url)?),
            None => {
                tracing::warn!("REDIS_URL not set, using in-memory coordination store");
                Arc::new(MemoryStore::new())
            }
        };

        let geolocator: Arc<dyn Geolocator> = if config.geolocation_disabled {
            tracing::warn!("geolocation disabled, using static distances");
            Arc::new(StaticGeolocator::default())
        } else {
            match &config.maps_api_key {
                Some(api_key) => Arc::new(GoogleGeolocator::new(&config.maps_api_url, api_key)),
                None => {
                    tracing::warn!("MAPS_API_KEY not set, using static distances");
                    Arc::new(StaticGeolocator::default())
                }
            }
        };

        let card_gateway: Arc<dyn CardGateway> = match &config.payment_secret_key {
            Some(secret_key) => {
                Arc::new(HttpCardGateway::new(&config.payment_api_url, secret_key))
            }
            None => {
                tracing::warn!("PAYMENT_SECRET_KEY not set, using mock card gateway");
                Arc::new(ApprovingCardGateway)
            }
        };

        let hub = Arc::new(WsHub::new());
        let realtime: Arc<dyn Realtime> = hub.clone();

        let payment_service = Arc::new(PaymentService::new(db.clone(), card_gateway));
        let dispatch_service = Arc::new(DispatchService::new(
            db.clone(),
            cache,
            geolocator.clone(),
            payment_service.clone(),
            realtime.clone(),
            DispatchConfig {
                wait_window_ms: config.wait_window_ms,
                search_radius_m: config.search_radius_m,
            },
        ));
        let trip_service = Arc::new(TripService::new(
            db.clone(),
            geolocator,
            payment_service.clone(),
            realtime,
        ));
        let rental_service = Arc::new(RentalService::new(db.clone(), payment_service.clone()));
        let vehicle_service = Arc::new(VehicleService::new(db.clone(), config.finishing_radius_m));

        Ok(Self {
            db,
            hub,
            dispatch_service,
            trip_service,
            rental_service,
            vehicle_service,
            payment_service,
            config,
        })
    }
}
