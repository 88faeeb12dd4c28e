// src/services/mod.rs
pub mod cache_service;
pub mod dispatch_service;
pub mod geolocation_service;
pub mod payment_service;
pub mod realtime_service;
pub mod rental_service;
pub mod trip_service;
pub mod vehicle_service;
