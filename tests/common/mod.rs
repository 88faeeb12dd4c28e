// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::Arc;

use rul_dispatch::{
    models::{
        rental::{BillingType, Rental, RentalStatus},
        trip::{PaymentMethod, RequestTripRequest, Trip, TripStatus},
        user::{Balance, Card, User},
        vehicle::{GeoPoint, Vehicle, VehicleStatus, VehicleType},
    },
    services::{
        cache_service::MemoryStore,
        dispatch_service::{DispatchConfig, DispatchService},
        geolocation_service::StaticGeolocator,
        payment_service::{ApprovingCardGateway, CardGateway, PaymentService},
        realtime_service::{RealtimeEvent, RecordingRealtime},
        rental_service::RentalService,
        trip_service::TripService,
        vehicle_service::VehicleService,
    },
    store::Database,
    utils::id_generator::{IdGenerator, IdType, WithGeneratedId},
};

/// Full service wiring on in-memory collaborators. The recording
/// realtime sink doubles as the assertion point for everything pushed
/// to riders and drivers.
pub struct TestHarness {
    pub db: Arc<Database>,
    pub realtime: Arc<RecordingRealtime>,
    pub dispatch: DispatchService,
    pub trips: TripService,
    pub rentals: RentalService,
    pub vehicles: VehicleService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_gateway(Arc::new(ApprovingCardGateway))
    }

    pub fn with_gateway(gateway: Arc<dyn CardGateway>) -> Self {
        let db = Arc::new(Database::new());
        let realtime = Arc::new(RecordingRealtime::new());
        let cache = Arc::new(MemoryStore::new());
        // Every road leg measures 10km, so classic trips quote at 850
        let geolocator = Arc::new(StaticGeolocator {
            distance_m: 10_000.0,
            eta_min: 5,
        });
        let payments = Arc::new(PaymentService::new(db.clone(), gateway));

        let dispatch = DispatchService::new(
            db.clone(),
            cache,
            geolocator.clone(),
            payments.clone(),
            realtime.clone(),
            DispatchConfig::default(),
        );
        let trips = TripService::new(
            db.clone(),
            geolocator,
            payments.clone(),
            realtime.clone(),
        );
        let rentals = RentalService::new(db.clone(), payments);
        let vehicles = VehicleService::new(db.clone(), 1_000.0);

        Self {
            db,
            realtime,
            dispatch,
            trips,
            rentals,
            vehicles,
        }
    }

    pub async fn seed_user(&self, first_name: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: IdGenerator::generate(IdType::User),
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            phone_number: "+233200000000".to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.db.users.insert(&user.id, user.clone()).await;
        user
    }

    pub async fn seed_vehicle(
        &self,
        driver_id: &str,
        vehicle_type: VehicleType,
        status: VehicleStatus,
        location: GeoPoint,
    ) -> Vehicle {
        let now = Utc::now();
        let mut vehicle = Vehicle {
            id: String::new(),
            driver_id: driver_id.to_string(),
            brand: "Toyota".to_string(),
            model: "Corolla".to_string(),
            color: "Silver".to_string(),
            registration: "GR-1024-26".to_string(),
            vehicle_type,
            status,
            location,
            hourly_rate: 5_000,
            daily_rate: 40_000,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        vehicle.set_generated_id(IdType::Vehicle);
        self.db.vehicles.insert(&vehicle.id, vehicle.clone()).await;
        vehicle
    }

    pub async fn seed_balance(&self, user_id: &str, amount: i64) -> Balance {
        let now = Utc::now();
        let balance = Balance {
            id: IdGenerator::generate(IdType::Payment),
            user_id: user_id.to_string(),
            amount,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.db.balances.insert(&balance.id, balance.clone()).await;
        balance
    }

    pub async fn seed_card(&self, user_id: &str) -> Card {
        let now = Utc::now();
        let card = Card {
            id: IdGenerator::generate(IdType::Payment),
            user_id: user_id.to_string(),
            provider: "visa".to_string(),
            last_four: "4242".to_string(),
            token: "tok_test".to_string(),
            is_default: true,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.db.cards.insert(&card.id, card.clone()).await;
        card
    }

    pub async fn seed_trip(
        &self,
        rider_id: &str,
        driver_id: &str,
        vehicle_id: &str,
        status: TripStatus,
        payment_method: PaymentMethod,
    ) -> Trip {
        let now = Utc::now();
        let mut trip = Trip {
            id: String::new(),
            rider_id: rider_id.to_string(),
            driver_id: driver_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            payment_method,
            amount: 850,
            from: pickup(),
            from_address: "Accra Mall".to_string(),
            to: dropoff(),
            to_address: "Kotoka Airport".to_string(),
            stops: Vec::new(),
            distance_m: 10_000.0,
            status,
            cancellation_reason: None,
            rating: None,
            meta: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        trip.set_generated_id(IdType::Trip);
        self.db.trips.insert(&trip.id, trip.clone()).await;
        trip
    }

    pub async fn seed_rental(
        &self,
        renter_id: &str,
        driver_id: &str,
        vehicle_id: &str,
        billing_type: BillingType,
        check_in: Option<DateTime<Utc>>,
        check_out: Option<DateTime<Utc>>,
    ) -> Rental {
        let now = Utc::now();
        let mut rental = Rental {
            id: String::new(),
            renter_id: renter_id.to_string(),
            driver_id: driver_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            billing_type,
            payment_method: PaymentMethod::Cash,
            price: 40_000,
            check_in,
            check_out,
            status: RentalStatus::Pending,
            meta: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        rental.set_generated_id(IdType::Rental);
        self.db.rentals.insert(&rental.id, rental.clone()).await;
        rental
    }
}

pub fn pickup() -> GeoPoint {
    GeoPoint::new(5.55, -0.20)
}

pub fn dropoff() -> GeoPoint {
    GeoPoint::new(5.60, -0.17)
}

/// A spot roughly a hundred meters from the pickup point.
pub fn near_pickup() -> GeoPoint {
    GeoPoint::new(5.551, -0.20)
}

/// A spot a few kilometers out, still inside the search radius.
pub fn far_from_pickup() -> GeoPoint {
    GeoPoint::new(5.58, -0.20)
}

pub fn ride_request(vehicle_type: VehicleType, payment_method: PaymentMethod) -> RequestTripRequest {
    RequestTripRequest {
        vehicle_type,
        payment_method,
        from: pickup(),
        from_address: "Accra Mall".to_string(),
        to: dropoff(),
        to_address: "Kotoka Airport".to_string(),
        stops: None,
    }
}

/// The offer token the driver was last handed over the realtime channel.
pub fn latest_offer_token(realtime: &RecordingRealtime, driver_id: &str) -> String {
    realtime
        .events_for(driver_id)
        .into_iter()
        .rev()
        .find(|(event, _)| *event == RealtimeEvent::RideRequest)
        .and_then(|(_, payload)| payload["trackingId"].as_str().map(String::from))
        .expect("driver received a ride request")
}

pub fn event_names(events: &[(RealtimeEvent, serde_json::Value)]) -> Vec<RealtimeEvent> {
    events.iter().map(|(event, _)| *event).collect()
}
