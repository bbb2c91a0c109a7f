//! Polymorphic inventory unit definitions.

use common::{define_kind, Date, DateTime, Money};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    availability::Slot,
    experience, listing, user, Experience, Listing,
};

pub use crate::domain::experience::Seats;

/// Bookable inventory unit: a nightly [`Listing`] or a timed [`Experience`].
#[derive(Clone, Debug, From)]
pub enum Unit {
    #[doc(hidden)]
    Listing(Listing),
    #[doc(hidden)]
    Experience(Experience),
}

impl Unit {
    /// Returns [`UnitId`] of this [`Unit`].
    #[must_use]
    pub fn id(&self) -> UnitId {
        match self {
            Self::Listing(l) => UnitId::Listing(l.id),
            Self::Experience(e) => UnitId::Experience(e.id),
        }
    }

    /// Returns [`Kind`] of this [`Unit`].
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Listing(_) => Kind::Listing,
            Self::Experience(_) => Kind::Experience,
        }
    }

    /// Returns ID of the [`User`] hosting this [`Unit`].
    ///
    /// [`User`]: crate::domain::User
    #[must_use]
    pub fn host_id(&self) -> user::Id {
        match self {
            Self::Listing(l) => l.host_id,
            Self::Experience(e) => e.host_id,
        }
    }

    /// Returns the base rate of this [`Unit`]: nightly for a [`Listing`],
    /// per-person for an [`Experience`].
    #[must_use]
    pub fn base_rate(&self) -> Money {
        match self {
            Self::Listing(l) => l.nightly_rate,
            Self::Experience(e) => e.price_per_person,
        }
    }

    /// Returns the nominal per-slot capacity of this [`Unit`].
    ///
    /// A [`Listing`] night is binary, an [`Experience`] session offers its
    /// configured number of seats.
    #[must_use]
    pub fn nominal_capacity(&self) -> Seats {
        match self {
            Self::Listing(_) => 1,
            Self::Experience(e) => e.seats,
        }
    }
}

/// ID of a [`Unit`], tagged by its [`Kind`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    From,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum UnitId {
    #[doc(hidden)]
    Listing(listing::Id),
    #[doc(hidden)]
    Experience(experience::Id),
}

impl UnitId {
    /// Returns [`Kind`] of the [`Unit`] this [`UnitId`] refers to.
    #[must_use]
    pub fn kind(self) -> Kind {
        match self {
            Self::Listing(_) => Kind::Listing,
            Self::Experience(_) => Kind::Experience,
        }
    }

    /// Returns the untagged [`Uuid`] of this [`UnitId`].
    #[must_use]
    pub fn uuid(self) -> Uuid {
        match self {
            Self::Listing(id) => id.into(),
            Self::Experience(id) => id.into(),
        }
    }

    /// Reassembles a [`UnitId`] from its [`Kind`] tag and untagged [`Uuid`].
    #[must_use]
    pub fn from_parts(kind: Kind, uuid: Uuid) -> Self {
        match kind {
            Kind::Listing => Self::Listing(uuid.into()),
            Kind::Experience => Self::Experience(uuid.into()),
        }
    }
}

define_kind! {
    #[doc = "Kind of a [`Unit`]."]
    enum Kind {
        #[doc = "A nightly stay listing."]
        Listing = 1,

        #[doc = "A timed group experience."]
        Experience = 2,
    }
}

/// Inventory span a reservation claims.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Span {
    /// Half-open range of nights in a [`Listing`].
    Nights {
        /// First night of the stay, inclusive.
        check_in: Date,

        /// Check-out [`Date`], exclusive.
        check_out: Date,
    },

    /// Single [`Experience`] session.
    Session {
        /// [`DateTime`] the session starts at.
        starts_at: DateTime,
    },
}

impl Span {
    /// Creates a new [`Span::Nights`] from the provided check-in and
    /// check-out [`Date`]s.
    ///
    /// # Errors
    ///
    /// If the range contains no nights.
    pub fn nights(
        check_in: Date,
        check_out: Date,
    ) -> Result<Self, InvalidRange> {
        if check_in < check_out {
            Ok(Self::Nights {
                check_in,
                check_out,
            })
        } else {
            Err(InvalidRange {
                check_in,
                check_out,
            })
        }
    }

    /// Creates a new [`Span::Session`] starting at the provided [`DateTime`].
    #[must_use]
    pub fn session(starts_at: DateTime) -> Self {
        Self::Session { starts_at }
    }

    /// Returns the number of nights this [`Span`] covers.
    ///
    /// [`None`] for a [`Span::Session`].
    #[must_use]
    pub fn num_nights(&self) -> Option<u32> {
        match self {
            Self::Nights {
                check_in,
                check_out,
            } => u32::try_from(check_in.days_until(*check_out)).ok(),
            Self::Session { .. } => None,
        }
    }

    /// Returns the [`DateTime`] this [`Span`] begins at.
    #[must_use]
    pub fn starts_at(&self) -> DateTime {
        match self {
            Self::Nights { check_in, .. } => check_in.midnight(),
            Self::Session { starts_at } => *starts_at,
        }
    }

    /// Returns the [`DateTime`] this [`Span`] ends at.
    ///
    /// A session ends after the provided fixed `session_duration`.
    #[must_use]
    pub fn ends_at(&self, session_duration: std::time::Duration) -> DateTime {
        match self {
            Self::Nights { check_out, .. } => check_out.midnight(),
            Self::Session { starts_at } => *starts_at + session_duration,
        }
    }

    /// Returns a lazy ordered sequence of the [`Slot`]s this [`Span`] covers.
    ///
    /// Restartable: [`Clone`] it to iterate again.
    #[must_use]
    pub fn slots(&self) -> Slots {
        match self {
            Self::Nights {
                check_in,
                check_out,
            } => Slots(SlotsInner::Nights(check_in.until(*check_out))),
            Self::Session { starts_at } => {
                Slots(SlotsInner::Session(Some(Slot::from(*starts_at))))
            }
        }
    }
}

/// Lazy ordered sequence of [`Slot`]s covered by a [`Span`].
#[derive(Clone, Copy, Debug)]
pub struct Slots(SlotsInner);

/// Inner representation of [`Slots`].
#[derive(Clone, Copy, Debug)]
enum SlotsInner {
    /// Nights of a [`Span::Nights`].
    Nights(common::date::Days),

    /// Not-yet-yielded slot of a [`Span::Session`].
    Session(Option<Slot>),
}

impl Iterator for Slots {
    type Item = Slot;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            SlotsInner::Nights(days) => days.next().map(Slot::from),
            SlotsInner::Session(slot) => slot.take(),
        }
    }
}

/// Error of constructing a [`Span::Nights`] with no nights in it.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("check-in `{check_in}` is not before check-out `{check_out}`")]
pub struct InvalidRange {
    /// Requested check-in [`Date`].
    pub check_in: Date,

    /// Requested check-out [`Date`].
    pub check_out: Date,
}

#[cfg(test)]
mod spec {
    use common::Date;

    use super::Span;

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn nights_requires_forward_range() {
        assert!(Span::nights(date("2025-01-10"), date("2025-01-12")).is_ok());
        assert!(Span::nights(date("2025-01-10"), date("2025-01-10")).is_err());
        assert!(Span::nights(date("2025-01-12"), date("2025-01-10")).is_err());
    }

    #[test]
    fn nights_span_yields_each_night() {
        let span =
            Span::nights(date("2025-01-10"), date("2025-01-13")).unwrap();

        assert_eq!(span.num_nights(), Some(3));
        assert_eq!(span.slots().count(), 3);
        // Restartable.
        assert_eq!(span.slots().count(), 3);
    }

    #[test]
    fn session_span_yields_single_slot() {
        let span = Span::session(common::DateTime::now());

        assert_eq!(span.num_nights(), None);
        assert_eq!(span.slots().count(), 1);
    }
}
