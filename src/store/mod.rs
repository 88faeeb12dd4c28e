// src/store/mod.rs
pub mod collection;

pub use collection::{Collection, Page};

use crate::models::{
    message::Message,
    rental::Rental,
    trip::Trip,
    user::{Balance, Card, User},
    vehicle::Vehicle,
};

/// The service's document store: one collection per aggregate. Documents
/// are soft-deleted only, so every query filters on the `deleted` flag.
pub struct Database {
    pub users: Collection<User>,
    pub balances: Collection<Balance>,
    pub cards: Collection<Card>,
    pub vehicles: Collection<Vehicle>,
    pub trips: Collection<Trip>,
    pub rentals: Collection<Rental>,
    pub messages: Collection<Message>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            users: Collection::new(),
            balances: Collection::new(),
            cards: Collection::new(),
            vehicles: Collection::new(),
            trips: Collection::new(),
            rentals: Collection::new(),
            messages: Collection::new(),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
