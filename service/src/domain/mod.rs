//! Domain definitions.

pub mod availability;
pub mod experience;
pub mod inventory;
pub mod listing;
pub mod payment;
pub mod pricing;
pub mod reservation;
pub mod user;

pub use self::{
    availability::AvailabilityRecord, experience::Experience,
    inventory::Unit, listing::Listing, payment::Payment,
    reservation::Reservation, user::User,
};
