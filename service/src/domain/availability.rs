//! Per-slot inventory availability definitions.

use std::fmt;

use common::{Date, DateTime, Money};
use derive_more::{Display, Error, From, Into};
use serde::{Deserialize, Serialize};

use crate::domain::{
    experience::Seats,
    inventory::{Kind, Span, Unit, UnitId},
};

/// Single bookable slot of a [`Unit`]: a night of a listing or a session of
/// an experience.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    From,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Slot(
    #[serde(with = "common::datetime::serde::unix_timestamp")] DateTime,
);

impl From<Date> for Slot {
    fn from(date: Date) -> Self {
        Self(date.midnight())
    }
}

impl Slot {
    /// Returns the calendar [`Date`] this [`Slot`] falls on.
    #[must_use]
    pub fn date(self) -> Date {
        Date::from(self.0)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

/// Per-slot availability truth of a [`Unit`].
///
/// At most one record exists per `(unit_id, slot)`. A missing record means
/// default availability for a listing and "not bookable" for an experience.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AvailabilityRecord {
    /// ID of the [`Unit`] this record constrains.
    pub unit_id: UnitId,

    /// [`Slot`] this record constrains.
    pub slot: Slot,

    /// Whether the [`Slot`] may currently be booked.
    pub is_available: bool,

    /// Remaining bookable capacity: binary for listings, seats for
    /// experiences.
    pub capacity_remaining: Seats,

    /// Per-slot price replacing the [`Unit`]'s base rate, if any.
    pub price_override: Option<Money>,
}

/// Token of inventory consumed by a successful claim.
///
/// References exactly the [`Slot`]s and seats marked consumed, enabling a
/// precise release on cancellation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Claim {
    /// ID of the claimed [`Unit`].
    pub unit_id: UnitId,

    /// [`Slot`]s the claim consumed.
    pub slots: Vec<Slot>,

    /// Seats consumed in every claimed [`Slot`].
    pub seats: Seats,
}

/// Availability calendar of a single [`Unit`] over a [`Span`].
///
/// Synthesizes a default [`AvailabilityRecord`] for every [`Slot`] lacking an
/// explicit one, per the [`Unit`]'s kind, and owns the claim/release
/// arithmetic over the resulting ordered sequence.
#[derive(Clone, Debug)]
pub struct Calendar {
    /// ID of the [`Unit`] this [`Calendar`] covers.
    unit_id: UnitId,

    /// [`Kind`] of the [`Unit`].
    kind: Kind,

    /// Nominal per-slot capacity of the [`Unit`].
    nominal: Seats,

    /// Ordered [`AvailabilityRecord`]s, one per [`Slot`] of the [`Span`].
    records: Vec<AvailabilityRecord>,
}

impl Calendar {
    /// Creates a new [`Calendar`] of the provided [`Unit`] over the provided
    /// [`Span`], merging the `existing` records with synthesized defaults.
    ///
    /// `existing` records outside the [`Span`] are ignored.
    #[must_use]
    pub fn new(
        unit: &Unit,
        span: &Span,
        existing: impl IntoIterator<Item = AvailabilityRecord>,
    ) -> Self {
        let unit_id = unit.id();
        let kind = unit.kind();
        let nominal = unit.nominal_capacity();

        let mut existing = existing
            .into_iter()
            .filter(|r| r.unit_id == unit_id)
            .collect::<Vec<_>>();
        existing.sort_by_key(|r| r.slot);
        let mut existing = existing.into_iter().peekable();

        let records = span
            .slots()
            .map(|slot| {
                while existing
                    .peek()
                    .is_some_and(|r| r.slot < slot)
                {
                    _ = existing.next();
                }
                if existing.peek().is_some_and(|r| r.slot == slot) {
                    existing.next().expect("peeked")
                } else {
                    Self::default_record(unit_id, kind, nominal, slot)
                }
            })
            .collect();

        Self {
            unit_id,
            kind,
            nominal,
            records,
        }
    }

    /// Returns the default [`AvailabilityRecord`] implied by a missing row:
    /// unconstrained for a listing, not bookable for an experience.
    fn default_record(
        unit_id: UnitId,
        kind: Kind,
        nominal: Seats,
        slot: Slot,
    ) -> AvailabilityRecord {
        match kind {
            Kind::Listing => AvailabilityRecord {
                unit_id,
                slot,
                is_available: true,
                capacity_remaining: nominal,
                price_override: None,
            },
            Kind::Experience => AvailabilityRecord {
                unit_id,
                slot,
                is_available: false,
                capacity_remaining: 0,
                price_override: None,
            },
        }
    }

    /// Returns the ordered [`AvailabilityRecord`]s of this [`Calendar`].
    #[must_use]
    pub fn records(&self) -> &[AvailabilityRecord] {
        &self.records
    }

    /// Consumes this [`Calendar`] returning its [`AvailabilityRecord`]s.
    #[must_use]
    pub fn into_records(self) -> Vec<AvailabilityRecord> {
        self.records
    }

    /// Verifies every [`Slot`] is bookable for the requested number of seats
    /// and marks them consumed, returning the [`Claim`] token.
    ///
    /// All-or-nothing: on any failure no [`Slot`] is touched.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::SlotsUnavailable`] naming every conflicting [`Slot`]
    ///   of a listing span.
    /// - [`ClaimError::InsufficientCapacity`] if an experience session lacks
    ///   the requested seats.
    pub fn try_claim(&mut self, seats: Seats) -> Result<Claim, ClaimError> {
        match self.kind {
            Kind::Listing => {
                let conflicting = self
                    .records
                    .iter()
                    .filter(|r| !r.is_available)
                    .map(|r| r.slot)
                    .collect::<Vec<_>>();
                if !conflicting.is_empty() {
                    return Err(ClaimError::SlotsUnavailable(conflicting));
                }
                for r in &mut self.records {
                    r.is_available = false;
                    r.capacity_remaining = 0;
                }
                Ok(Claim {
                    unit_id: self.unit_id,
                    slots: self.records.iter().map(|r| r.slot).collect(),
                    seats: 1,
                })
            }
            Kind::Experience => {
                let Some(r) = self.records.first_mut() else {
                    return Err(ClaimError::SlotsUnavailable(Vec::new()));
                };
                if !r.is_available || r.capacity_remaining < seats {
                    return Err(ClaimError::InsufficientCapacity {
                        slot: r.slot,
                        requested: seats,
                        remaining: if r.is_available {
                            r.capacity_remaining
                        } else {
                            0
                        },
                    });
                }
                r.capacity_remaining -= seats;
                if r.capacity_remaining == 0 {
                    r.is_available = false;
                }
                Ok(Claim {
                    unit_id: self.unit_id,
                    slots: vec![r.slot],
                    seats,
                })
            }
        }
    }

    /// Marks every [`Slot`] of this [`Calendar`] consumed without a prior
    /// availability check.
    ///
    /// Idempotent for listings. Experience capacity clamps at zero instead of
    /// going negative.
    ///
    /// # Errors
    ///
    /// [`CapacityExhausted`] if fewer seats remained than the caller expected
    /// to consume. Under correct per-unit locking this never happens, so it
    /// is an invariant breach, not a user-facing conflict.
    pub fn mark_unavailable(
        &mut self,
        seats: Seats,
    ) -> Result<(), CapacityExhausted> {
        let mut exhausted = None;
        for r in &mut self.records {
            match self.kind {
                Kind::Listing => {
                    r.is_available = false;
                    r.capacity_remaining = 0;
                }
                Kind::Experience => {
                    if r.capacity_remaining < seats && exhausted.is_none() {
                        exhausted = Some(CapacityExhausted {
                            slot: r.slot,
                            requested: seats,
                            remaining: r.capacity_remaining,
                        });
                    }
                    r.capacity_remaining =
                        r.capacity_remaining.saturating_sub(seats);
                    if r.capacity_remaining == 0 {
                        r.is_available = false;
                    }
                }
            }
        }
        exhausted.map_or(Ok(()), Err)
    }

    /// Releases the provided [`Claim`] back: restores availability and
    /// returns seats, bounded by the [`Unit`]'s nominal capacity.
    pub fn release(&mut self, claim: &Claim) {
        for r in &mut self.records {
            if !claim.slots.contains(&r.slot) {
                continue;
            }
            match self.kind {
                Kind::Listing => {
                    r.is_available = true;
                    r.capacity_remaining = self.nominal;
                }
                Kind::Experience => {
                    r.capacity_remaining = r
                        .capacity_remaining
                        .saturating_add(claim.seats)
                        .min(self.nominal);
                    r.is_available = r.capacity_remaining > 0;
                }
            }
        }
    }
}

/// Error of claiming inventory for a booking.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
pub enum ClaimError {
    /// One or more requested [`Slot`]s are not available.
    #[display("slots unavailable: {_0:?}")]
    SlotsUnavailable(#[error(not(source))] Vec<Slot>),

    /// The session [`Slot`] lacks the requested number of seats.
    #[display(
        "insufficient capacity in slot `{slot}`: \
         requested {requested}, remaining {remaining}"
    )]
    InsufficientCapacity {
        /// The session [`Slot`].
        slot: Slot,

        /// Requested number of seats.
        requested: Seats,

        /// Seats actually remaining.
        remaining: Seats,
    },
}

/// Capacity dropped below an expected consumption.
///
/// Indicates a breach of the per-unit claim serialization, so it is treated
/// as fatal rather than routed to callers as an ordinary conflict.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
#[display(
    "capacity exhausted in slot `{slot}`: \
     requested {requested}, remaining {remaining}"
)]
pub struct CapacityExhausted {
    /// The exhausted [`Slot`].
    pub slot: Slot,

    /// Number of seats expected to be consumed.
    pub requested: Seats,

    /// Seats actually remaining.
    pub remaining: Seats,
}

/// Selector of [`AvailabilityRecord`]s of one [`Unit`] over a [`Span`].
#[derive(Clone, Copy, Debug)]
pub struct OfUnitWithin {
    /// ID of the [`Unit`].
    pub unit_id: UnitId,

    /// Half-open [`DateTime`] range covering the requested [`Slot`]s.
    pub from: DateTime,

    /// End of the range, exclusive.
    pub until: DateTime,
}

impl OfUnitWithin {
    /// Creates a new [`OfUnitWithin`] selector covering the provided
    /// [`Span`] of the provided [`Unit`].
    #[must_use]
    pub fn spanning(unit: &Unit, span: &Span) -> Self {
        let until = match span {
            Span::Nights { check_out, .. } => check_out.midnight(),
            // Strictly after the session slot itself.
            Span::Session { starts_at } => {
                *starts_at + std::time::Duration::from_secs(1)
            }
        };
        Self {
            unit_id: unit.id(),
            from: span.starts_at(),
            until,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Date, DateTime, Money};

    use crate::domain::{
        experience::{self, GroupTiers},
        inventory::{Span, Unit},
        listing,
        pricing::StayDiscounts,
        user, Experience, Listing,
    };

    use super::{AvailabilityRecord, Calendar, ClaimError, Slot};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn usd(amount: &str) -> Money {
        Money {
            amount: amount.parse().unwrap(),
            currency: Currency::Usd,
        }
    }

    fn listing() -> Unit {
        Unit::Listing(Listing {
            id: listing::Id::new(),
            host_id: user::Id::new(),
            title: "Cabin by the lake".parse().unwrap(),
            nightly_rate: usd("100"),
            discounts: StayDiscounts::default(),
            max_guests: 4,
            created_at: common::DateTime::now().coerce(),
        })
    }

    fn experience(seats: u16) -> Unit {
        Unit::Experience(Experience {
            id: experience::Id::new(),
            host_id: user::Id::new(),
            title: "Pottery class".parse().unwrap(),
            price_per_person: usd("20"),
            duration: std::time::Duration::from_secs(2 * 60 * 60),
            seats,
            tiers: GroupTiers::default(),
            created_at: common::DateTime::now().coerce(),
        })
    }

    fn nights(from: &str, to: &str) -> Span {
        Span::nights(date(from), date(to)).unwrap()
    }

    fn open_session(unit: &Unit, at: DateTime, seats: u16) -> AvailabilityRecord {
        AvailabilityRecord {
            unit_id: unit.id(),
            slot: Slot::from(at),
            is_available: true,
            capacity_remaining: seats,
            price_override: None,
        }
    }

    #[test]
    fn listing_nights_default_to_available() {
        let unit = listing();
        let span = nights("2025-01-10", "2025-01-13");

        let calendar = Calendar::new(&unit, &span, []);

        assert_eq!(calendar.records().len(), 3);
        assert!(calendar.records().iter().all(|r| r.is_available));
    }

    #[test]
    fn experience_sessions_default_to_closed() {
        let unit = experience(10);
        let span = Span::session(DateTime::now());

        let mut calendar = Calendar::new(&unit, &span, []);

        assert!(!calendar.records()[0].is_available);
        assert!(matches!(
            calendar.try_claim(2),
            Err(ClaimError::InsufficientCapacity { remaining: 0, .. }),
        ));
    }

    #[test]
    fn claim_lists_every_conflicting_night() {
        let unit = listing();
        let span = nights("2025-01-10", "2025-01-14");
        let booked = [
            AvailabilityRecord {
                unit_id: unit.id(),
                slot: Slot::from(date("2025-01-11")),
                is_available: false,
                capacity_remaining: 0,
                price_override: None,
            },
            AvailabilityRecord {
                unit_id: unit.id(),
                slot: Slot::from(date("2025-01-12")),
                is_available: false,
                capacity_remaining: 0,
                price_override: None,
            },
        ];

        let mut calendar = Calendar::new(&unit, &span, booked);

        assert_eq!(
            calendar.try_claim(1),
            Err(ClaimError::SlotsUnavailable(vec![
                Slot::from(date("2025-01-11")),
                Slot::from(date("2025-01-12")),
            ])),
        );
        // No partial claim happened.
        assert!(calendar.records()[0].is_available);
        assert!(calendar.records()[3].is_available);
    }

    #[test]
    fn claim_then_release_restores_pre_claim_state() {
        let unit = listing();
        let span = nights("2025-01-10", "2025-01-13");

        let mut calendar = Calendar::new(&unit, &span, []);
        let before = calendar.records().to_vec();

        let claim = calendar.try_claim(1).unwrap();
        assert!(calendar.records().iter().all(|r| !r.is_available));

        calendar.release(&claim);
        assert_eq!(calendar.records(), &before[..]);
    }

    #[test]
    fn session_seats_decrement_and_release_bounded_by_nominal() {
        let unit = experience(10);
        let at = DateTime::now();
        let span = Span::session(at);

        let mut calendar =
            Calendar::new(&unit, &span, [open_session(&unit, at, 10)]);

        let claim = calendar.try_claim(4).unwrap();
        assert_eq!(calendar.records()[0].capacity_remaining, 6);

        calendar.release(&claim);
        assert_eq!(calendar.records()[0].capacity_remaining, 10);

        // Releasing again cannot exceed the nominal capacity.
        calendar.release(&claim);
        assert_eq!(calendar.records()[0].capacity_remaining, 10);
    }

    #[test]
    fn exhausting_session_closes_it() {
        let unit = experience(5);
        let at = DateTime::now();
        let span = Span::session(at);

        let mut calendar =
            Calendar::new(&unit, &span, [open_session(&unit, at, 5)]);

        _ = calendar.try_claim(5).unwrap();
        assert!(!calendar.records()[0].is_available);

        assert!(matches!(
            calendar.try_claim(1),
            Err(ClaimError::InsufficientCapacity { remaining: 0, .. }),
        ));
    }

    #[test]
    fn mark_unavailable_is_idempotent_for_listings() {
        let unit = listing();
        let span = nights("2025-01-10", "2025-01-12");

        let mut calendar = Calendar::new(&unit, &span, []);
        calendar.mark_unavailable(1).unwrap();
        let once = calendar.records().to_vec();

        calendar.mark_unavailable(1).unwrap();
        assert_eq!(calendar.records(), &once[..]);
    }

    #[test]
    fn mark_unavailable_clamps_session_capacity_at_zero() {
        let unit = experience(3);
        let at = DateTime::now();
        let span = Span::session(at);

        let mut calendar =
            Calendar::new(&unit, &span, [open_session(&unit, at, 3)]);

        calendar.mark_unavailable(3).unwrap();
        assert_eq!(calendar.records()[0].capacity_remaining, 0);

        // Expected seats are gone: clamped, signalled.
        assert!(calendar.mark_unavailable(3).is_err());
        assert_eq!(calendar.records()[0].capacity_remaining, 0);
    }
}
