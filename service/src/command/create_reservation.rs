//! [`Command`] for creating a new [`Reservation`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, ClaimError, OfUnitWithin},
        experience::Seats,
        inventory::{Kind, Span, UnitId},
        pricing::{self, QuoteError},
        reservation, user, AvailabilityRecord, Reservation, Unit, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Reservation`].
#[derive(Clone, Debug)]
pub struct CreateReservation {
    /// [`User`] booking the [`Unit`].
    pub actor: user::Actor,

    /// ID of the [`Unit`] to book.
    pub unit_id: UnitId,

    /// [`Span`] to book the [`Unit`] for.
    pub span: Span,

    /// Number of guests or attendees.
    pub party_size: Seats,
}

impl<Db> Command<CreateReservation> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Unit>, UnitId>>,
            Ok = Option<Unit>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Unit, UnitId>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<AvailabilityRecord>, OfUnitWithin>>,
            Ok = Vec<AvailabilityRecord>,
            Err = Traced<database::Error>,
        > + Database<Update<AvailabilityRecord>, Err = Traced<database::Error>>
        + Database<Insert<Reservation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Reservation;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateReservation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateReservation {
            actor,
            unit_id,
            span,
            party_size,
        } = cmd;

        self.database()
            .execute(Select(By::<Option<User>, _>::new(actor.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(actor.id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let unit = self
            .database()
            .execute(Select(By::<Option<Unit>, _>::new(unit_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UnitNotExists(unit_id))
            .map_err(tracerr::wrap!())?;

        let span_kind = match span {
            Span::Nights { .. } => Kind::Listing,
            Span::Session { .. } => Kind::Experience,
        };
        if span_kind != unit.kind() {
            return Err(tracerr::new!(E::SpanMismatch {
                unit: unit.kind(),
                span: span_kind,
            }));
        }
        if party_size == 0 {
            return Err(tracerr::new!(E::Quote(QuoteError::EmptyGroup)));
        }
        let max_party = match &unit {
            Unit::Listing(l) => l.max_guests,
            Unit::Experience(e) => e.seats,
        };
        if party_size > max_party {
            return Err(tracerr::new!(E::PartyTooLarge {
                requested: party_size,
                max: max_party,
            }));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent claims upon the same `Unit`.
        tx.execute(Lock(By::new(unit_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let existing = tx
            .execute(Select(By::<Vec<AvailabilityRecord>, _>::new(
                OfUnitWithin::spanning(&unit, &span),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let mut calendar = availability::Calendar::new(&unit, &span, existing);

        let total_price = match &unit {
            Unit::Listing(listing) => {
                let Span::Nights {
                    check_in,
                    check_out,
                } = span
                else {
                    // Guarded by the kind check above.
                    return Err(tracerr::new!(E::SpanMismatch {
                        unit: Kind::Listing,
                        span: Kind::Experience,
                    }));
                };
                pricing::quote_stay(
                    listing.nightly_rate,
                    check_in,
                    check_out,
                    &listing.discounts,
                )
                .map_err(tracerr::from_and_wrap!(=> E))?
            }
            Unit::Experience(experience) => {
                let price_override = calendar
                    .records()
                    .first()
                    .and_then(|r| r.price_override);
                pricing::quote_session(
                    experience.price_per_person,
                    price_override,
                    party_size,
                    &experience.tiers,
                )
                .map_err(tracerr::from_and_wrap!(=> E))?
            }
        };

        _ = calendar
            .try_claim(party_size)
            .map_err(tracerr::from_and_wrap!(=> E))?;
        for record in calendar.into_records() {
            tx.execute(Update(record))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let reservation = Reservation {
            id: reservation::Id::new(),
            guest_id: actor.id,
            unit_id,
            span,
            party_size,
            status: reservation::Status::Pending,
            total_price,
            created_at: DateTime::now().coerce(),
        };
        tx.execute(Insert(reservation.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(reservation)
    }
}

/// Error of [`CreateReservation`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Requested [`Slot`]s cannot be claimed.
    ///
    /// [`Slot`]: availability::Slot
    #[display("cannot claim the requested slots: {_0}")]
    #[from]
    Claim(ClaimError),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Party doesn't fit into the [`Unit`].
    #[display("party of {requested} exceeds the unit capacity of {max}")]
    PartyTooLarge {
        /// Requested party size.
        requested: Seats,

        /// Maximum capacity of the [`Unit`].
        max: Seats,
    },

    /// Quote cannot be computed for the requested [`Span`].
    #[display("cannot quote the requested span: {_0}")]
    #[from]
    Quote(QuoteError),

    /// Requested [`Span`] doesn't match the [`Unit`]'s kind.
    #[display("`{span}` span cannot book a `{unit}` unit")]
    SpanMismatch {
        /// [`Kind`] of the [`Unit`].
        unit: Kind,

        /// [`Kind`] the [`Span`] is meant for.
        span: Kind,
    },

    /// [`Unit`] with the provided ID does not exist.
    #[display("unit `{_0:?}` does not exist")]
    UnitNotExists(#[error(not(source))] UnitId),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{operations::Insert, Date, DateTime};
    use futures::future;

    use crate::{
        command::fixtures,
        domain::{
            availability::{AvailabilityRecord, ClaimError, Slot},
            inventory::{Span, UnitId},
            reservation::Status,
            user::Role,
        },
        infra::Database as _,
        Command as _,
    };

    use super::{CreateReservation, ExecutionError};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn nights(from: &str, to: &str) -> Span {
        Span::nights(date(from), date(to)).unwrap()
    }

    #[tokio::test]
    async fn books_a_listing_stay() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-06-10", "2025-06-12"),
                party_size: 2,
            })
            .await
            .unwrap();

        assert_eq!(reservation.guest_id, guest.id);
        assert_eq!(reservation.status, Status::Pending);
        assert_eq!(reservation.total_price, fixtures::usd("200"));
    }

    #[tokio::test]
    async fn rejects_overlapping_stay_naming_conflicting_nights() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let other = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        _ = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-01-10", "2025-01-12"),
                party_size: 2,
            })
            .await
            .unwrap();

        let err = service
            .execute(CreateReservation {
                actor: other,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-01-11", "2025-01-13"),
                party_size: 2,
            })
            .await
            .unwrap_err()
            .into_inner();

        match err {
            ExecutionError::Claim(ClaimError::SlotsUnavailable(slots)) => {
                assert_eq!(slots, vec![Slot::from(date("2025-01-11"))]);
            }
            e @ (ExecutionError::Claim(_)
            | ExecutionError::Db(_)
            | ExecutionError::PartyTooLarge { .. }
            | ExecutionError::Quote(_)
            | ExecutionError::SpanMismatch { .. }
            | ExecutionError::UnitNotExists(_)
            | ExecutionError::UserNotExists(_)) => {
                panic!("unexpected error: {e}")
            }
        }
    }

    #[tokio::test]
    async fn serializes_concurrent_claims() {
        let (service, db) = fixtures::service().await;
        let first = fixtures::user(&db, Role::Guest).await;
        let second = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let book = |actor| {
            service.execute(CreateReservation {
                actor,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-03-01", "2025-03-03"),
                party_size: 1,
            })
        };
        let (a, b) = future::join(book(first), book(second)).await;

        assert_eq!(
            [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count(),
            1,
            "exactly one overlapping claim may win",
        );
    }

    #[tokio::test]
    async fn rejects_party_exceeding_capacity() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let err = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-06-10", "2025-06-12"),
                party_size: 5,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(
            err,
            ExecutionError::PartyTooLarge {
                requested: 5,
                max: 4,
            },
        ));
    }

    #[tokio::test]
    async fn rejects_span_of_wrong_kind() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let experience = fixtures::experience(&db, host.id, 8).await;

        let err = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Experience(experience.id),
                span: nights("2025-06-10", "2025-06-12"),
                party_size: 2,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::SpanMismatch { .. }));
    }

    #[tokio::test]
    async fn decrements_session_seats_across_bookings() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let other = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let experience = fixtures::experience(&db, host.id, 8).await;

        let starts_at = DateTime::from_unix_timestamp(1_750_000_000).unwrap();
        db.execute(Insert(AvailabilityRecord {
            unit_id: UnitId::Experience(experience.id),
            slot: Slot::from(starts_at),
            is_available: true,
            capacity_remaining: 8,
            price_override: None,
        }))
        .await
        .unwrap();

        _ = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Experience(experience.id),
                span: Span::session(starts_at),
                party_size: 5,
            })
            .await
            .unwrap();

        let err = service
            .execute(CreateReservation {
                actor: other,
                unit_id: UnitId::Experience(experience.id),
                span: Span::session(starts_at),
                party_size: 4,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(
            err,
            ExecutionError::Claim(ClaimError::InsufficientCapacity {
                requested: 4,
                remaining: 3,
                ..
            }),
        ));
    }

    #[tokio::test]
    async fn rejects_session_without_schedule() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let experience = fixtures::experience(&db, host.id, 8).await;

        // No `AvailabilityRecord` seeded: the session is not on schedule.
        let err = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Experience(experience.id),
                span: Span::session(
                    DateTime::from_unix_timestamp(1_750_000_000).unwrap(),
                ),
                party_size: 2,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::Claim(_)));
    }
}
