//! [`Reservation`]-related read entities.

use common::DateTime;

#[cfg(doc)]
use crate::domain::Reservation;

/// Selector of [`Reservation`]s whose stay or session has ended before the
/// provided [`DateTime`] while still being in a completable status.
#[derive(Clone, Copy, Debug)]
pub struct ElapsedBefore(pub DateTime);
