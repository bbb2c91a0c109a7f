//! Host-related read entities.

use common::Money;

#[cfg(doc)]
use crate::domain::{Payment, Reservation, User};

/// Net earnings of a host [`User`] over its settled [`Payment`]s.
///
/// Net amount of a single [`Payment`] is its amount minus whatever was
/// refunded of it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Earnings {
    /// Net totals, one per currency the host was paid in.
    pub totals: Vec<Money>,

    /// Number of settled [`Payment`]s the totals are built from.
    pub payments_count: i64,
}
