// src/models/mod.rs
pub mod user;
pub mod vehicle;
pub mod trip;
pub mod rental;
pub mod message;

pub use user::*;
pub use vehicle::*;
pub use trip::*;
pub use rental::*;
pub use message::*;
