//! [`Command`] for cancelling a [`Reservation`].

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Claim, OfUnitWithin},
        inventory::UnitId,
        reservation::{self, IllegalTransition},
        user::{self, Role},
        AvailabilityRecord, Reservation, Unit,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Reservation`].
///
/// Guests may cancel their own [`Reservation`]s, hosts the ones placed on
/// their [`Unit`]s, admins any. The held inventory is released in the same
/// transaction as the status flip.
#[derive(Clone, Debug)]
pub struct CancelReservation {
    /// [`User`] cancelling the [`Reservation`].
    ///
    /// [`User`]: crate::domain::User
    pub actor: user::Actor,

    /// ID of the [`Reservation`] to cancel.
    pub reservation_id: reservation::Id,
}

impl<Db> Command<CancelReservation> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Reservation, reservation::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Reservation>, reservation::Id>>,
            Ok = Option<Reservation>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Unit>, UnitId>>,
            Ok = Option<Unit>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Unit, UnitId>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Vec<AvailabilityRecord>, OfUnitWithin>>,
            Ok = Vec<AvailabilityRecord>,
            Err = Traced<database::Error>,
        > + Database<Update<AvailabilityRecord>, Err = Traced<database::Error>>
        + Database<Update<Reservation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Reservation;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CancelReservation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelReservation {
            actor,
            reservation_id,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent status flips upon the same `Reservation`.
        tx.execute(Lock(By::new(reservation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut reservation = tx
            .execute(Select(By::<Option<Reservation>, _>::new(reservation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ReservationNotExists(reservation_id))
            .map_err(tracerr::wrap!())?;

        let unit = tx
            .execute(Select(By::<Option<Unit>, _>::new(reservation.unit_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UnitNotExists(reservation.unit_id))
            .map_err(tracerr::wrap!())?;
        let authorized = match actor.role {
            Role::Admin => true,
            Role::Host => unit.host_id() == actor.id,
            Role::Guest => reservation.guest_id == actor.id,
        };
        if !authorized {
            return Err(tracerr::new!(E::NotAuthorized(actor.id)));
        }

        reservation
            .cancel(actor.role)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        if reservation.status.releases_inventory() {
            // Avoid concurrent claims upon the same `Unit`.
            tx.execute(Lock(By::new(reservation.unit_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

            let existing = tx
                .execute(Select(By::<Vec<AvailabilityRecord>, _>::new(
                    OfUnitWithin::spanning(&unit, &reservation.span),
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            let mut calendar =
                availability::Calendar::new(&unit, &reservation.span, existing);
            calendar.release(&Claim {
                unit_id: reservation.unit_id,
                slots: reservation.span.slots().collect(),
                seats: reservation.party_size,
            });
            for record in calendar.into_records() {
                tx.execute(Update(record))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;
            }
        }

        tx.execute(Update(reservation.clone()))
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

/// Error of [`CancelReservation`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Reservation`] is not in a cancellable state.
    #[display("{_0}")]
    #[from]
    Illegal(IllegalTransition),

    /// Acting [`User`] is not allowed to cancel the [`Reservation`].
    ///
    /// [`User`]: crate::domain::User
    #[display("`User(id: {_0})` is not allowed to cancel the reservation")]
    NotAuthorized(#[error(not(source))] user::Id),

    /// [`Reservation`] with the provided ID does not exist.
    #[display("`Reservation(id: {_0})` does not exist")]
    ReservationNotExists(#[error(not(source))] reservation::Id),

    /// [`Unit`] of the [`Reservation`] does not exist.
    #[display("unit `{_0:?}` does not exist")]
    UnitNotExists(#[error(not(source))] UnitId),
}

#[cfg(test)]
mod spec {
    use common::Date;

    use crate::{
        command::{fixtures, CompleteReservation, CreateReservation},
        domain::{
            inventory::{Span, UnitId},
            reservation::Status,
            user::Role,
        },
        Command as _,
    };

    use super::{CancelReservation, ExecutionError};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn nights(from: &str, to: &str) -> Span {
        Span::nights(date(from), date(to)).unwrap()
    }

    #[tokio::test]
    async fn releases_the_held_nights() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let other = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let span = nights("2025-02-01", "2025-02-04");
        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span,
                party_size: 2,
            })
            .await
            .unwrap();

        let cancelled = service
            .execute(CancelReservation {
                actor: guest,
                reservation_id: reservation.id,
            })
            .await
            .unwrap();
        assert_eq!(cancelled.status, Status::CancelledByGuest);

        // The freed nights are bookable again.
        _ = service
            .execute(CreateReservation {
                actor: other,
                unit_id: UnitId::Listing(listing.id),
                span,
                party_size: 2,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn records_host_initiated_cancellation() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-02-01", "2025-02-03"),
                party_size: 2,
            })
            .await
            .unwrap();

        let cancelled = service
            .execute(CancelReservation {
                actor: host,
                reservation_id: reservation.id,
            })
            .await
            .unwrap();

        assert_eq!(cancelled.status, Status::CancelledByHost);
    }

    #[tokio::test]
    async fn refuses_a_foreign_guest() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let stranger = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-02-01", "2025-02-03"),
                party_size: 2,
            })
            .await
            .unwrap();

        let err = service
            .execute(CancelReservation {
                actor: stranger,
                reservation_id: reservation.id,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn refuses_a_completed_reservation() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-02-01", "2025-02-03"),
                party_size: 2,
            })
            .await
            .unwrap();
        _ = service
            .execute(crate::command::ConfirmReservation {
                actor: host,
                reservation_id: reservation.id,
            })
            .await
            .unwrap();
        _ = service
            .execute(CompleteReservation {
                reservation_id: reservation.id,
            })
            .await
            .unwrap();

        let err = service
            .execute(CancelReservation {
                actor: guest,
                reservation_id: reservation.id,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::Illegal(_)));
    }
}
