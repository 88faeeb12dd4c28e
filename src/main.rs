use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use rul_dispatch::{
    handlers::{admin_handler, rental_handler, ride_handler, ws_handler},
    state::{AppConfig, AppState},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    let port = config.port;
    let app_state = AppState::new(config).await.unwrap();

    let app = Router::new()
        .route("/rides", get(ride_handler::get_available_rides))
        .route("/rides/quotes", get(ride_handler::get_ride_quotes))
        .route("/rides/catalog", get(rental_handler::get_hire_catalog))
        .route(
            "/rides/vehicles",
            post(ride_handler::register_vehicle).get(ride_handler::get_own_vehicles),
        )
        .route(
            "/rides/vehicles/:vehicle",
            put(ride_handler::update_vehicle_status).delete(ride_handler::remove_vehicle),
        )
        .route(
            "/rides/trips",
            post(ride_handler::request_ride)
                .put(ride_handler::accept_ride_request)
                .delete(ride_handler::cancel_ride_request)
                .get(ride_handler::get_trips),
        )
        .route("/rides/trips/ongoing", get(ride_handler::get_ongoing_trip))
        .route(
            "/rides/trips/:trip",
            put(ride_handler::update_trip).delete(ride_handler::cancel_trip),
        )
        .route(
            "/rides/trips/:trip/messages",
            post(ride_handler::send_message).get(ride_handler::get_messages),
        )
        .route("/rides/hire", post(rental_handler::hire_vehicle))
        .route("/rides/hire/ongoing", get(rental_handler::get_ongoing_rental))
        .route("/admin/rides/trips", get(admin_handler::get_trips))
        .route("/admin/rides/trips/:trip", get(admin_handler::get_trip))
        .route("/admin/rides/rentals", get(admin_handler::get_rentals))
        .route("/admin/rides/rentals/:rental", get(admin_handler::get_rental))
        .route("/ws", get(ws_handler::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(app_state));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .unwrap();
    tracing::info!("Dispatch engine listening on 0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}
