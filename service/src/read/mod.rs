//! Read entities definitions.

pub mod host;
pub mod reservation;

pub use self::host::Earnings;
