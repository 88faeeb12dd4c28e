// tests/trip_flow.rs
mod common;

use common::*;
use std::sync::Arc;

use rul_dispatch::models::message::SendMessageRequest;
use rul_dispatch::models::trip::{
    PaymentMethod, RatingRequest, StopRequest, TripStatus, TripStop, TripStopStatus,
    UpdateTripRequest,
};
use rul_dispatch::models::vehicle::{GeoPoint, VehicleStatus, VehicleType};
use rul_dispatch::services::payment_service::DecliningCardGateway;
use rul_dispatch::services::realtime_service::RealtimeEvent;
use rul_dispatch::services::trip_service::TripOperations;

fn set_status(status: TripStatus) -> UpdateTripRequest {
    UpdateTripRequest {
        status: Some(status),
        rating: None,
        stops: None,
    }
}

#[tokio::test]
async fn driver_walks_the_trip_to_settlement() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, near_pickup())
        .await;
    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Started, PaymentMethod::Cash)
        .await;

    let updated = h
        .trips
        .update_trip(&driver.id, &trip.id, set_status(TripStatus::DriverArrived))
        .await
        .unwrap();
    assert_eq!(updated.status, TripStatus::DriverArrived);

    let updated = h
        .trips
        .update_trip(&driver.id, &trip.id, set_status(TripStatus::InProgress))
        .await
        .unwrap();
    assert_eq!(updated.status, TripStatus::InProgress);

    let settled = h
        .trips
        .update_trip(&driver.id, &trip.id, set_status(TripStatus::Completed))
        .await
        .unwrap();
    assert_eq!(settled.status, TripStatus::Completed);
    assert_eq!(settled.amount, 850);
    assert!(settled.meta.as_ref().unwrap().get("paymentResponse").is_some());

    // The vehicle is back in rotation
    let released = h.db.vehicles.get(&vehicle.id).await.unwrap();
    assert_eq!(released.status, VehicleStatus::Online);

    assert_eq!(
        event_names(&h.realtime.events_for(&rider.id)),
        vec![
            RealtimeEvent::DriverArrived,
            RealtimeEvent::TripInProgress,
            RealtimeEvent::TripEnded,
        ]
    );
}

#[tokio::test]
async fn transitions_enforce_actor_and_order() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, near_pickup())
        .await;
    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Started, PaymentMethod::Cash)
        .await;

    // The rider cannot announce the driver's arrival
    let err = h.trips.announce_arrival(&rider.id, &trip.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");

    // The ride cannot begin before the driver arrived
    let err = h.trips.begin_trip(&driver.id, &trip.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");

    // Nor end before it began
    let err = h.trips.end_trip(&driver.id, &trip.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");

    // A made-up id never matches anything
    let err = h
        .trips
        .update_trip(&driver.id, "trip-1", set_status(TripStatus::DriverArrived))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");
}

#[tokio::test]
async fn declined_card_marks_the_trip_payment_failed() {
    let h = TestHarness::with_gateway(Arc::new(DecliningCardGateway));
    let rider = h.seed_user("Ama").await;
    h.seed_card(&rider.id).await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, near_pickup())
        .await;
    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::InProgress, PaymentMethod::Card)
        .await;

    let settled = h.trips.end_trip(&driver.id, &trip.id).await.unwrap();
    assert_eq!(settled.status, TripStatus::PaymentFailed);
    assert_eq!(
        settled.meta.as_ref().unwrap()["paymentError"],
        "Payment error: card charge declined - insufficient funds"
    );

    // The driver goes free even though the charge bounced
    let released = h.db.vehicles.get(&vehicle.id).await.unwrap();
    assert_eq!(released.status, VehicleStatus::Online);
    assert!(event_names(&h.realtime.events_for(&driver.id)).contains(&RealtimeEvent::PaymentFailed));
}

#[tokio::test]
async fn either_party_can_cancel_before_pickup_only() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, near_pickup())
        .await;

    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Started, PaymentMethod::Cash)
        .await;
    let cancelled = h
        .trips
        .cancel_trip(&rider.id, &trip.id, Some("changed my mind".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, TripStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed my mind"));
    let released = h.db.vehicles.get(&vehicle.id).await.unwrap();
    assert_eq!(released.status, VehicleStatus::Online);

    // The driver can back out while waiting at the pickup point
    let waiting = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::DriverArrived, PaymentMethod::Cash)
        .await;
    let cancelled = h.trips.cancel_trip(&driver.id, &waiting.id, None).await.unwrap();
    assert_eq!(cancelled.status, TripStatus::Cancelled);

    // Once the rider is on board the trip can only run to its end
    let rolling = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::InProgress, PaymentMethod::Cash)
        .await;
    let err = h.trips.cancel_trip(&rider.id, &rolling.id, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");
}

#[tokio::test]
async fn rating_is_rider_only_on_settled_trips() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Online, near_pickup())
        .await;
    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Completed, PaymentMethod::Cash)
        .await;

    let rate = |score| RatingRequest {
        score,
        comment: Some("smooth ride".to_string()),
    };

    let err = h.trips.rate_trip(&rider.id, &trip.id, rate(0)).await.unwrap_err();
    assert_eq!(err.to_string(), "Bad request: rating must be between 1 and 5");
    let err = h.trips.rate_trip(&rider.id, &trip.id, rate(6)).await.unwrap_err();
    assert_eq!(err.to_string(), "Bad request: rating must be between 1 and 5");

    // Drivers do not rate
    let err = h.trips.rate_trip(&driver.id, &trip.id, rate(5)).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");

    let rated = h.trips.rate_trip(&rider.id, &trip.id, rate(5)).await.unwrap();
    assert_eq!(rated.rating.as_ref().unwrap().score, 5);

    // One rating ever
    let err = h.trips.rate_trip(&rider.id, &trip.id, rate(4)).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");
}

#[tokio::test]
async fn replacing_stops_keeps_served_legs_and_reprices() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, near_pickup())
        .await;
    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::InProgress, PaymentMethod::Cash)
        .await;

    // One leg has already been served
    h.db.trips
        .update_one(
            |t| t.id == trip.id,
            |t| {
                t.stops = vec![TripStop {
                    location: GeoPoint::new(5.57, -0.19),
                    address: "Osu".to_string(),
                    status: TripStopStatus::Completed,
                    distance_m: 2_500.0,
                }]
            },
        )
        .await;

    let updated = h
        .trips
        .update_stops(
            &rider.id,
            &trip.id,
            vec![StopRequest {
                location: GeoPoint::new(5.59, -0.18),
                address: "Labone".to_string(),
            }],
        )
        .await
        .unwrap();

    assert_eq!(updated.stops.len(), 2);
    assert_eq!(updated.stops[0].address, "Osu");
    assert_eq!(updated.stops[0].status, TripStopStatus::Completed);
    assert_eq!(updated.stops[0].distance_m, 2_500.0);
    assert_eq!(updated.stops[1].address, "Labone");
    assert_eq!(updated.stops[1].status, TripStopStatus::Pending);
    assert_eq!(updated.stops[1].distance_m, 10_000.0);
    assert_eq!(updated.final_distance_m(), 22_500.0);

    // Outsiders cannot reroute the trip
    let stranger = h.seed_user("Esi").await;
    let err = h.trips.update_stops(&stranger.id, &trip.id, Vec::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");

    // Settlement charges for the whole route actually driven
    let settled = h.trips.end_trip(&driver.id, &trip.id).await.unwrap();
    assert_eq!(settled.amount, 1_913);
}

#[tokio::test]
async fn update_requires_a_recognised_change() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, near_pickup())
        .await;
    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Started, PaymentMethod::Cash)
        .await;

    let empty = UpdateTripRequest {
        status: None,
        rating: None,
        stops: None,
    };
    let err = h.trips.update_trip(&driver.id, &trip.id, empty).await.unwrap_err();
    assert_eq!(err.to_string(), "Bad request: trip not updated");

    // Cancellation has its own endpoint
    let err = h
        .trips
        .update_trip(&driver.id, &trip.id, set_status(TripStatus::Cancelled))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Bad request: trip not updated");
}

#[tokio::test]
async fn trip_chat_is_party_only_and_ordered() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let stranger = h.seed_user("Esi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Busy, near_pickup())
        .await;
    let trip = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Started, PaymentMethod::Cash)
        .await;

    h.trips
        .send_message(&rider.id, &trip.id, SendMessageRequest { text: "I am at the gate".to_string() })
        .await
        .unwrap();
    h.trips
        .send_message(&driver.id, &trip.id, SendMessageRequest { text: "Two minutes away".to_string() })
        .await
        .unwrap();

    let err = h
        .trips
        .send_message(&stranger.id, &trip.id, SendMessageRequest { text: "hello".to_string() })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");

    let messages = h.trips.get_messages(&driver.id, &trip.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "I am at the gate");
    assert_eq!(messages[1].text, "Two minutes away");

    // Both parties were pushed both messages
    assert_eq!(
        event_names(&h.realtime.events_for(&rider.id)),
        vec![RealtimeEvent::NewMessage, RealtimeEvent::NewMessage]
    );

    let err = h.trips.get_messages(&stranger.id, &trip.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");
}

#[tokio::test]
async fn history_is_newest_first_and_paged() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Online, near_pickup())
        .await;

    let first = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Completed, PaymentMethod::Cash)
        .await;
    let second = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Cancelled, PaymentMethod::Cash)
        .await;
    let third = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Completed, PaymentMethod::Cash)
        .await;

    let page = h.trips.get_trip_history(&rider.id, 1, 2).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, third.id);
    assert_eq!(page.items[1].id, second.id);

    let page = h.trips.get_trip_history(&rider.id, 2, 2).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, first.id);
}

#[tokio::test]
async fn back_office_reads_any_trip() {
    let h = TestHarness::new();
    let rider = h.seed_user("Ama").await;
    let driver = h.seed_user("Kofi").await;
    let vehicle = h
        .seed_vehicle(&driver.id, VehicleType::Classic, VehicleStatus::Online, near_pickup())
        .await;

    let completed = h
        .seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Completed, PaymentMethod::Cash)
        .await;
    h.seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Completed, PaymentMethod::Cash)
        .await;
    h.seed_trip(&rider.id, &driver.id, &vehicle.id, TripStatus::Started, PaymentMethod::Cash)
        .await;

    let page = h.trips.list_trips(Some(TripStatus::Completed), 1, 100).await.unwrap();
    assert_eq!(page.total, 2);
    let page = h.trips.list_trips(None, 1, 100).await.unwrap();
    assert_eq!(page.total, 3);

    let fetched = h.trips.get_trip(&completed.id).await.unwrap();
    assert_eq!(fetched.id, completed.id);

    let err = h.trips.get_trip("trp-000000-zzzzz").await.unwrap_err();
    assert_eq!(err.to_string(), "Not found: trip not found");
}
