//! [`Command`] for refunding a [`Payment`].

use common::{
    operations::{
        By, Commit, Lock, Select, Transact, Transacted, Update,
    },
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        inventory::UnitId,
        payment::{self, RefundError},
        reservation::{self, IllegalTransition},
        user::{self, Role},
        Payment, Reservation, Unit,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for refunding a settled [`Payment`], fully or partially.
///
/// A full refund moves both the [`Payment`] and its [`Reservation`] to
/// `Refunded`. A partial one only marks the [`Payment`] as
/// [`PartiallyRefunded`], leaving the [`Reservation`] as is.
///
/// [`PartiallyRefunded`]: payment::Status::PartiallyRefunded
#[derive(Clone, Debug)]
pub struct RefundPayment {
    /// [`User`] issuing the refund.
    ///
    /// [`User`]: crate::domain::User
    pub actor: user::Actor,

    /// ID of the [`Payment`] to refund.
    pub payment_id: payment::Id,

    /// Amount to refund.
    pub amount: Money,
}

impl<Db> Command<RefundPayment> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
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
        > + Database<Update<Payment>, Err = Traced<database::Error>>
        + Database<Update<Reservation>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RefundPayment) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RefundPayment {
            actor,
            payment_id,
            amount,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let mut payment = tx
            .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(payment_id))
            .map_err(tracerr::wrap!())?;

        // Avoid concurrent refunds upon the same `Reservation`.
        tx.execute(Lock(By::new(payment.reservation_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut reservation = tx
            .execute(Select(By::<Option<Reservation>, _>::new(
                payment.reservation_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ReservationNotExists(payment.reservation_id))
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

        let full = payment
            .refund(amount, DateTime::now().coerce())
            .map_err(tracerr::from_and_wrap!(=> E))?;
        reservation
            .payment_refunded(full)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        tx.execute(Update(payment.clone()))
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

/// Error of [`RefundPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Reservation`] cannot reflect the refund in its current state.
    #[display("{_0}")]
    #[from]
    Illegal(IllegalTransition),

    /// Acting [`User`] is not allowed to refund the [`Payment`].
    ///
    /// [`User`]: crate::domain::User
    #[display("`User(id: {_0})` is not allowed to refund the payment")]
    NotAuthorized(#[error(not(source))] user::Id),

    /// [`Payment`] with the provided ID does not exist.
    #[display("`Payment(id: {_0})` does not exist")]
    PaymentNotExists(#[error(not(source))] payment::Id),

    /// [`Payment`] cannot be refunded as requested.
    #[display("cannot refund the payment: {_0}")]
    #[from]
    Refund(RefundError),

    /// [`Reservation`] of the [`Payment`] does not exist.
    #[display("`Reservation(id: {_0})` does not exist")]
    ReservationNotExists(#[error(not(source))] reservation::Id),

    /// [`Unit`] of the [`Reservation`] does not exist.
    #[display("unit `{_0:?}` does not exist")]
    UnitNotExists(#[error(not(source))] UnitId),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Select},
        Date,
    };

    use crate::{
        command::{
            fixtures, ConfirmReservation, CreateReservation, RecordPayment,
        },
        domain::{
            inventory::{Span, UnitId},
            payment::{Method, RefundError, Status},
            reservation,
            user::{Actor, Role},
            Payment, Reservation,
        },
        infra::{database::InMemory, Database as _},
        Command as _, Service,
    };

    use super::{ExecutionError, RefundPayment};

    /// Books a 2-night stay at $100/night, confirms and settles it.
    async fn paid_booking(
        service: &Service<InMemory>,
        db: &InMemory,
        guest: Actor,
        host: Actor,
    ) -> Payment {
        let listing = fixtures::listing(db, host.id).await;
        let date = |s: &str| s.parse::<Date>().unwrap();
        let reservation = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: Span::nights(date("2025-07-01"), date("2025-07-03"))
                    .unwrap(),
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
        service
            .execute(RecordPayment {
                actor: guest,
                reservation_id: reservation.id,
                amount: reservation.total_price,
                method: Method::Card,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_refund_flips_both_statuses() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let payment = paid_booking(&service, &db, guest, host).await;

        let refunded = service
            .execute(RefundPayment {
                actor: host,
                payment_id: payment.id,
                amount: fixtures::usd("200"),
            })
            .await
            .unwrap();

        assert_eq!(refunded.status, Status::Refunded);
        assert_eq!(refunded.refunded_amount, Some(fixtures::usd("200")));

        let reservation = db
            .execute(Select(By::<Option<Reservation>, _>::new(
                payment.reservation_id,
            )))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reservation.status, reservation::Status::Refunded);
    }

    #[tokio::test]
    async fn partial_refund_keeps_the_reservation_paid() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let payment = paid_booking(&service, &db, guest, host).await;

        let refunded = service
            .execute(RefundPayment {
                actor: host,
                payment_id: payment.id,
                amount: fixtures::usd("80"),
            })
            .await
            .unwrap();

        assert_eq!(refunded.status, Status::PartiallyRefunded);
        assert_eq!(refunded.refunded_amount, Some(fixtures::usd("80")));

        let reservation = db
            .execute(Select(By::<Option<Reservation>, _>::new(
                payment.reservation_id,
            )))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reservation.status, reservation::Status::Paid);
    }

    #[tokio::test]
    async fn partial_refunds_accumulate_up_to_the_payment() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let payment = paid_booking(&service, &db, guest, host).await;

        _ = service
            .execute(RefundPayment {
                actor: host,
                payment_id: payment.id,
                amount: fixtures::usd("150"),
            })
            .await
            .unwrap();

        let err = service
            .execute(RefundPayment {
                actor: host,
                payment_id: payment.id,
                amount: fixtures::usd("100"),
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(
            err,
            ExecutionError::Refund(RefundError::ExceedsPayment { .. }),
        ));
    }

    #[tokio::test]
    async fn refuses_a_guest() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let payment = paid_booking(&service, &db, guest, host).await;

        let err = service
            .execute(RefundPayment {
                actor: guest,
                payment_id: payment.id,
                amount: fixtures::usd("200"),
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::NotAuthorized(_)));
    }
}
