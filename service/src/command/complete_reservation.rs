//! [`Command`] for completing an elapsed [`Reservation`].

use std::time::Duration;

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        inventory::UnitId,
        reservation::{self, IllegalTransition},
        Reservation, Unit,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for completing a [`Reservation`] whose [`Span`] has elapsed.
///
/// Consumed inventory stays consumed: a completed stay is history, not a
/// released claim.
///
/// [`Span`]: crate::domain::inventory::Span
#[derive(Clone, Copy, Debug)]
pub struct CompleteReservation {
    /// ID of the [`Reservation`] to complete.
    pub reservation_id: reservation::Id,
}

impl<Db> Command<CompleteReservation> for Service<Db>
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
        > + Database<Update<Reservation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Reservation;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CompleteReservation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CompleteReservation { reservation_id } = cmd;

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
        let session_duration = match &unit {
            Unit::Listing(_) => Duration::ZERO,
            Unit::Experience(e) => e.duration,
        };
        if reservation.span.ends_at(session_duration) > DateTime::now() {
            return Err(tracerr::new!(E::NotElapsed(reservation_id)));
        }

        reservation
            .mark_completed()
            .map_err(tracerr::from_and_wrap!(=> E))?;
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

/// Error of [`CompleteReservation`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Reservation`] is not in a completable state.
    #[display("{_0}")]
    #[from]
    Illegal(IllegalTransition),

    /// [`Reservation`]'s span has not elapsed yet.
    #[display("`Reservation(id: {_0})` has not reached its end yet")]
    NotElapsed(#[error(not(source))] reservation::Id),

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
        command::{fixtures, ConfirmReservation, CreateReservation},
        domain::{
            inventory::{Span, UnitId},
            reservation::Status,
            user::Role,
        },
        Command as _,
    };

    use super::{CompleteReservation, ExecutionError};

    fn nights(from: &str, to: &str) -> Span {
        let date = |s: &str| s.parse::<Date>().unwrap();
        Span::nights(date(from), date(to)).unwrap()
    }

    #[tokio::test]
    async fn completes_a_confirmed_reservation() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-08-01", "2025-08-03"),
                party_size: 2,
            })
            .await
            .unwrap();
        _ = service
            .execute(ConfirmReservation {
                actor: host,
                reservation_id: reservation.id,
            })
            .await
            .unwrap();

        let completed = service
            .execute(CompleteReservation {
                reservation_id: reservation.id,
            })
            .await
            .unwrap();

        assert_eq!(completed.status, Status::Completed);
    }

    #[tokio::test]
    async fn refuses_a_future_checkout() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2099-08-01", "2099-08-03"),
                party_size: 2,
            })
            .await
            .unwrap();
        _ = service
            .execute(ConfirmReservation {
                actor: host,
                reservation_id: reservation.id,
            })
            .await
            .unwrap();

        let err = service
            .execute(CompleteReservation {
                reservation_id: reservation.id,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(
            err,
            ExecutionError::NotElapsed(id) if id == reservation.id,
        ));
    }

    #[tokio::test]
    async fn refuses_a_pending_reservation() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-08-01", "2025-08-03"),
                party_size: 2,
            })
            .await
            .unwrap();

        let err = service
            .execute(CompleteReservation {
                reservation_id: reservation.id,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::Illegal(_)));
    }
}
