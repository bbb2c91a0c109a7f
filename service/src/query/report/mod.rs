//! Report [`Query`] collection.
//!
//! [`Query`]: crate::Query

pub mod earnings;

pub use self::earnings::Earnings;
