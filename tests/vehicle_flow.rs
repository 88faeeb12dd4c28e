// tests/vehicle_flow.rs
mod common;

use common::*;

use rul_dispatch::models::trip::{PaymentMethod, TripStatus};
use rul_dispatch::models::vehicle::{
    RegisterVehicleRequest, VehicleLocationUpdate, VehicleStatus, VehicleType,
};
use rul_dispatch::services::vehicle_service::VehicleOperations;

#[tokio::test]
async fn registration_starts_pending_until_the_driver_goes_online() {
    let h = TestHarness::new();
    let driver = h.seed_user("Kofi").await;

    let vehicle = h
        .vehicles
        .register_vehicle(
            &driver.id,
            RegisterVehicleRequest {
                brand: "Hyundai".to_string(),
                model: "Elantra".to_string(),
                color: "Black".to_string(),
                registration: "GT-5050-26".to_string(),
                vehicle_type: VehicleType::Classic,
                location: pickup(),
                hourly_rate: None,
                daily_rate: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(vehicle.status, VehicleStatus::Pending);
    assert_eq!(vehicle.hourly_rate, 0);
    assert!(!vehicle.status.is_dispatchable());

    let online = h
        .vehicles
        .set_status(&driver.id, &vehicle.id, VehicleStatus::Online)
        .await
        .unwrap();
    assert_eq!(online.status, VehicleStatus::Online);

    let mine = h.vehicles.get_own_vehicles(&driver.id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, vehicle.id);
}

#[tokio::test]
async fn drivers_only_toggle_between_online_and_offline() {
    let h = TestHarness::new();
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Online, pickup())
        .await;

    // Busy and FinishingTrip belong to the dispatcher
    let err = h
        .vehicles
        .set_status(&driver.id, &vehicle.id, VehicleStatus::Busy)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Bad request: vehicle status cannot be changed");

    // A vehicle on a trip cannot be pulled off shift
    h.db.vehicles
        .update_one(|v| v.id == vehicle.id, |v| v.status = VehicleStatus::Busy)
        .await;
    let err = h
        .vehicles
        .set_status(&driver.id, &vehicle.id, VehicleStatus::Offline)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Bad request: vehicle status cannot be changed");

    // Nor can anyone toggle someone else's vehicle
    let other = h.seed_user("Esi").await;
    h.db.vehicles
        .update_one(|v| v.id == vehicle.id, |v| v.status = VehicleStatus::Online)
        .await;
    let err = h
        .vehicles
        .set_status(&other.id, &vehicle.id, VehicleStatus::Offline)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Bad request: vehicle status cannot be changed");
}

#[tokio::test]
async fn removal_soft_deletes_and_parks_the_vehicle() {
    let h = TestHarness::new();
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Online, pickup())
        .await;

    let removed = h.vehicles.remove_vehicle(&driver.id, &vehicle.id).await.unwrap();
    assert!(removed.deleted);
    assert_eq!(removed.status, VehicleStatus::Offline);
    assert!(h.vehicles.get_own_vehicles(&driver.id).await.unwrap().is_empty());

    let err = h.vehicles.remove_vehicle(&driver.id, &vehicle.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: vehicle not found");
}

#[tokio::test]
async fn closing_in_on_the_destination_flips_to_finishing() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, pickup())
        .await;
    h.seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::InProgress, PaymentMethod::Cash)
        .await;

    // Still kilometers from the drop-off
    let moved = h
        .vehicles
        .update_location(
            &driver.id,
            VehicleLocationUpdate {
                vehicle: vehicle.id.clone(),
                latitude: 5.57,
                longitude: -0.19,
                heading: Some(45.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.status, VehicleStatus::Busy);
    assert_eq!(moved.location.latitude, 5.57);
    assert_eq!(moved.location.heading, Some(45.0));

    // Inside the finishing radius of the drop-off
    let finishing = h
        .vehicles
        .update_location(
            &driver.id,
            VehicleLocationUpdate {
                vehicle: vehicle.id.clone(),
                latitude: dropoff().latitude,
                longitude: dropoff().longitude,
                heading: Some(45.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(finishing.status, VehicleStatus::FinishingTrip);
    assert!(finishing.status.is_dispatchable());

    // Position reports are owner-only
    let other = h.seed_user("Esi").await;
    let err = h
        .vehicles
        .update_location(
            &other.id,
            VehicleLocationUpdate {
                vehicle: vehicle.id.clone(),
                latitude: 5.55,
                longitude: -0.20,
                heading: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not found: vehicle not found");
}

#[tokio::test]
async fn location_updates_before_boarding_do_not_finish_the_trip() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, pickup())
        .await;
    h.seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Started, PaymentMethod::Cash)
        .await;

    // Even at the drop-off point, a trip still heading to pickup keeps
    // the vehicle busy
    let moved = h
        .vehicles
        .update_location(
            &driver.id,
            VehicleLocationUpdate {
                vehicle: vehicle.id.clone(),
                latitude: dropoff().latitude,
                longitude: dropoff().longitude,
                heading: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.status, VehicleStatus::Busy);
}
