//! [`Command`] for confirming a [`Reservation`].

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        inventory::UnitId,
        reservation::{self, IllegalTransition},
        user::{self, Role},
        Reservation, Unit,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for confirming a [`Reservation`] by its host.
#[derive(Clone, Debug)]
pub struct ConfirmReservation {
    /// [`User`] confirming the [`Reservation`].
    ///
    /// [`User`]: crate::domain::User
    pub actor: user::Actor,

    /// ID of the [`Reservation`] to confirm.
    pub reservation_id: reservation::Id,
}

impl<Db> Command<ConfirmReservation> for Service<Db>
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
        cmd: ConfirmReservation,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConfirmReservation {
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
            Role::Guest => false,
        };
        if !authorized {
            return Err(tracerr::new!(E::NotAuthorized(actor.id)));
        }

        reservation
            .confirm()
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

/// Error of [`ConfirmReservation`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Reservation`] is not in a confirmable state.
    #[display("{_0}")]
    #[from]
    Illegal(IllegalTransition),

    /// Acting [`User`] is not allowed to confirm the [`Reservation`].
    ///
    /// [`User`]: crate::domain::User
    #[display("`User(id: {_0})` is not allowed to confirm the reservation")]
    NotAuthorized(#[error(not(source))] user::Id),

    /// [`Reservation`] with the provided ID does not exist.
    #[display("`Reservation(id: {_0})` does not exist")]
    ReservationNotExists(#[error(not(source))] reservation::Id),

    /// [`Unit`] of the [`Reservation`] does not exist.
    #[display("unit `{_0:?}` does not exist")]
    UnitNotExists(#[error(not(source))] UnitId),
}
