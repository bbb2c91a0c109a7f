//! [`Command`] for recording a settled [`Payment`].

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        payment,
        reservation::{self, IllegalTransition},
        user::{self, Role},
        Payment, Reservation,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for recording a settled [`Payment`] against a
/// [`Reservation`].
///
/// Settlement is synchronous: the recorded [`Payment`] is
/// [`payment::Status::Completed`] right away, and the [`Reservation`] moves
/// to [`Paid`] in the same transaction.
///
/// [`Paid`]: reservation::Status::Paid
#[derive(Clone, Debug)]
pub struct RecordPayment {
    /// [`User`] paying for the [`Reservation`].
    ///
    /// [`User`]: crate::domain::User
    pub actor: user::Actor,

    /// ID of the [`Reservation`] being paid for.
    pub reservation_id: reservation::Id,

    /// Settled amount.
    pub amount: Money,

    /// [`payment::Method`] the amount was settled with.
    pub method: payment::Method,
}

impl<Db> Command<RecordPayment> for Service<Db>
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
            Select<By<Option<Payment>, reservation::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Err = Traced<database::Error>>
        + Database<Update<Reservation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RecordPayment) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RecordPayment {
            actor,
            reservation_id,
            amount,
            method,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent settlements upon the same `Reservation`.
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

        let authorized = match actor.role {
            Role::Admin => true,
            Role::Guest | Role::Host => reservation.guest_id == actor.id,
        };
        if !authorized {
            return Err(tracerr::new!(E::NotAuthorized(actor.id)));
        }

        if let Some(existing) = tx
            .execute(Select(By::<Option<Payment>, _>::new(reservation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
        {
            return Err(tracerr::new!(E::AlreadyPaid(existing.id)));
        }

        reservation
            .payment_completed()
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let payment = Payment {
            id: payment::Id::new(),
            reservation_id,
            amount,
            status: payment::Status::Completed,
            method,
            refunded_amount: None,
            paid_at: DateTime::now().coerce(),
            refunded_at: None,
        };
        tx.execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Update(reservation))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(payment)
    }
}

/// Error of [`RecordPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Reservation`] already has a [`Payment`] recorded.
    #[display("reservation is already paid by `Payment(id: {_0})`")]
    AlreadyPaid(#[error(not(source))] payment::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Reservation`] cannot accept a [`Payment`] in its current state.
    #[display("{_0}")]
    #[from]
    Illegal(IllegalTransition),

    /// Acting [`User`] is not allowed to pay for the [`Reservation`].
    ///
    /// [`User`]: crate::domain::User
    #[display("`User(id: {_0})` is not allowed to pay for the reservation")]
    NotAuthorized(#[error(not(source))] user::Id),

    /// [`Reservation`] with the provided ID does not exist.
    #[display("`Reservation(id: {_0})` does not exist")]
    ReservationNotExists(#[error(not(source))] reservation::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select},
        Date,
    };

    use crate::{
        command::{fixtures, ConfirmReservation, CreateReservation},
        domain::{
            inventory::{Span, UnitId},
            payment::{self, Method},
            reservation::{self, Status},
            user::{Actor, Role},
            Reservation,
        },
        infra::{database::InMemory, Database as _},
        Command as _, Service,
    };

    use super::{ExecutionError, RecordPayment};

    fn nights(from: &str, to: &str) -> Span {
        let date = |s: &str| s.parse::<Date>().unwrap();
        Span::nights(date(from), date(to)).unwrap()
    }

    async fn confirmed_reservation(
        service: &Service<InMemory>,
        db: &InMemory,
        guest: Actor,
    ) -> Reservation {
        let host = fixtures::user(db, Role::Host).await;
        let listing = fixtures::listing(db, host.id).await;
        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-05-01", "2025-05-03"),
                party_size: 2,
            })
            .await
            .unwrap();
        service
            .execute(ConfirmReservation {
                actor: host,
                reservation_id: reservation.id,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn settles_a_confirmed_reservation() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let reservation = confirmed_reservation(&service, &db, guest).await;

        let payment = service
            .execute(RecordPayment {
                actor: guest,
                reservation_id: reservation.id,
                amount: reservation.total_price,
                method: Method::Card,
            })
            .await
            .unwrap();

        assert_eq!(payment.status, payment::Status::Completed);
        assert_eq!(payment.amount, reservation.total_price);

        let reservation = db
            .execute(Select(By::<Option<Reservation>, _>::new(reservation.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reservation.status, Status::Paid);
    }

    #[tokio::test]
    async fn refuses_a_second_payment() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let reservation = confirmed_reservation(&service, &db, guest).await;

        let cmd = RecordPayment {
            actor: guest,
            reservation_id: reservation.id,
            amount: reservation.total_price,
            method: Method::Card,
        };
        let payment = service.execute(cmd.clone()).await.unwrap();
        let err = service.execute(cmd).await.unwrap_err().into_inner();

        assert!(matches!(
            err,
            ExecutionError::AlreadyPaid(id) if id == payment.id,
        ));
    }

    #[tokio::test]
    async fn settles_a_pending_reservation_directly() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;
        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: nights("2025-05-01", "2025-05-03"),
                party_size: 2,
            })
            .await
            .unwrap();

        // Paying skips confirmation: a settled payment is an implicit one.
        let payment = service
            .execute(RecordPayment {
                actor: guest,
                reservation_id: reservation.id,
                amount: reservation.total_price,
                method: Method::Card,
            })
            .await
            .unwrap();
        assert_eq!(payment.status, payment::Status::Completed);

        let reservation = db
            .execute(Select(By::<Option<Reservation>, _>::new(reservation.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reservation.status, Status::Paid);
    }

    #[tokio::test]
    async fn refuses_a_foreign_guest() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let stranger = fixtures::user(&db, Role::Guest).await;
        let reservation = confirmed_reservation(&service, &db, guest).await;

        let err = service
            .execute(RecordPayment {
                actor: stranger,
                reservation_id: reservation.id,
                amount: reservation.total_price,
                method: Method::Card,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn reports_a_missing_reservation() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;

        let err = service
            .execute(RecordPayment {
                actor: guest,
                reservation_id: reservation::Id::new(),
                amount: fixtures::usd("100"),
                method: Method::Wallet,
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::ReservationNotExists(_)));
    }
}
