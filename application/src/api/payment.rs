//! [`Payment`]-related handlers and definitions.

use axum::{extract::Path, Extension, Json};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::{self, payment, reservation},
    query, Command as _, Query as _,
};

use crate::{
    actor::Actor,
    api::{
        self,
        reservation::{
            illegal_transition, not_authorized, reservation_not_exists,
        },
    },
    define_error, AsError, Error, Service,
};

/// Status of a [`Payment`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Initiated, not yet handed to the processor.
    Pending,

    /// In flight at the processor.
    Processing,

    /// Settled successfully.
    Completed,

    /// Rejected by the processor.
    Failed,

    /// Refunded in full.
    Refunded,

    /// Refunded partially.
    PartiallyRefunded,

    /// Disputed by the payer.
    Disputed,
}

impl From<payment::Status> for Status {
    fn from(status: payment::Status) -> Self {
        use payment::Status as S;

        match status {
            S::Pending => Self::Pending,
            S::Processing => Self::Processing,
            S::Completed => Self::Completed,
            S::Failed => Self::Failed,
            S::Refunded => Self::Refunded,
            S::PartiallyRefunded => Self::PartiallyRefunded,
            S::Disputed => Self::Disputed,
        }
    }
}

/// Method a [`Payment`] is made with.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    /// Debit or credit card.
    Card,

    /// Direct bank transfer.
    BankTransfer,

    /// Platform wallet balance.
    Wallet,
}

impl From<Method> for payment::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Card => Self::Card,
            Method::BankTransfer => Self::BankTransfer,
            Method::Wallet => Self::Wallet,
        }
    }
}

impl From<payment::Method> for Method {
    fn from(method: payment::Method) -> Self {
        use payment::Method as M;

        match method {
            M::Card => Self::Card,
            M::BankTransfer => Self::BankTransfer,
            M::Wallet => Self::Wallet,
        }
    }
}

/// A settled payment of a reservation.
#[derive(Clone, Debug, Serialize)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: payment::Id,

    /// ID of the paid reservation.
    pub reservation_id: reservation::Id,

    /// Settled amount.
    pub amount: api::Money,

    /// [`Status`] of this [`Payment`].
    pub status: Status,

    /// [`Method`] this [`Payment`] was made with.
    pub method: Method,

    /// Accumulated refunded amount, if any.
    pub refunded_amount: Option<api::Money>,

    /// `DateTime` this [`Payment`] settled at, as a Unix timestamp.
    #[serde(with = "common::datetime::serde::unix_timestamp")]
    pub paid_at: payment::SettlementDateTime,

    /// `DateTime` of the last refund, as a Unix timestamp, if any.
    pub refunded_at: Option<i64>,
}

impl From<domain::Payment> for Payment {
    fn from(payment: domain::Payment) -> Self {
        Self {
            id: payment.id,
            reservation_id: payment.reservation_id,
            amount: payment.amount.into(),
            status: payment.status.into(),
            method: payment.method.into(),
            refunded_amount: payment.refunded_amount.map(Into::into),
            paid_at: payment.paid_at,
            refunded_at: payment.refunded_at.map(|at| at.unix_timestamp()),
        }
    }
}

/// Request body for [`pay()`].
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PaymentRequest {
    /// Amount to settle.
    pub amount: api::Money,

    /// [`Method`] the payment is made with.
    pub method: Method,
}

/// Request body for [`refund()`].
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct RefundRequest {
    /// Amount to refund.
    pub amount: api::Money,
}

/// Handler of `GET /payments/{id}`.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_AUTHORIZED` - payment belongs to another guest;
/// - `PAYMENT_NOT_EXISTS` - unknown payment.
pub async fn get(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Path(id): Path<payment::Id>,
) -> Result<Json<Payment>, Error> {
    let payment = service
        .execute(query::payment::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(payment_not_exists)?;

    authorize_guest(&service, actor, payment.reservation_id).await?;
    Ok(Json(payment.into()))
}

/// Handler of `GET /reservations/{id}/payment`.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_AUTHORIZED` - reservation belongs to another guest;
/// - `PAYMENT_NOT_EXISTS` - reservation has no settled payment.
pub async fn of_reservation(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Path(id): Path<reservation::Id>,
) -> Result<Json<Payment>, Error> {
    authorize_guest(&service, actor, id).await?;

    service
        .execute(query::payment::ByReservationId::by(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(payment_not_exists)
        .map(|p| Json(p.into()))
}

/// Denies a [`user::Role::Guest`] actor access to a payment of a
/// [`Reservation`] placed by another guest.
///
/// [`Reservation`]: service::domain::Reservation
/// [`user::Role::Guest`]: service::domain::user::Role::Guest
async fn authorize_guest(
    service: &Service,
    actor: service::domain::user::Actor,
    reservation_id: reservation::Id,
) -> Result<(), Error> {
    use service::domain::user::Role;

    if actor.role != Role::Guest {
        return Ok(());
    }
    let owns = service
        .execute(query::reservation::ById::by(reservation_id))
        .await
        .map_err(AsError::into_error)?
        .is_some_and(|r| r.guest_id == actor.id);
    owns.then_some(()).ok_or_else(not_authorized)
}

/// [`Error`] for a [`Payment`] missing in the storage.
fn payment_not_exists() -> Error {
    Error {
        code: "PAYMENT_NOT_EXISTS",
        status_code: StatusCode::NOT_FOUND,
        message: "Payment with the provided ID does not exist".into(),
        backtrace: None,
    }
}

/// Handler of `POST /reservations/{id}/payments`.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_AUTHORIZED` - actor may not pay for this reservation;
/// - `RESERVATION_NOT_EXISTS` - unknown reservation;
/// - `ALREADY_PAID` - reservation has a payment recorded already;
/// - `ILLEGAL_TRANSITION` - reservation is not `CONFIRMED`.
pub async fn pay(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Path(id): Path<reservation::Id>,
    Json(req): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), Error> {
    service
        .execute(command::RecordPayment {
            actor,
            reservation_id: id,
            amount: req.amount.into(),
            method: req.method.into(),
        })
        .await
        .map_err(AsError::into_error)
        .map(|p| (StatusCode::CREATED, Json(p.into())))
}

/// Handler of `POST /payments/{id}/refund`.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_AUTHORIZED` - actor may not refund this payment;
/// - `PAYMENT_NOT_EXISTS` - unknown payment;
/// - `REFUND_EXCEEDS_PAYMENT`, `CURRENCY_MISMATCH` - malformed refund amount;
/// - `PAYMENT_NOT_SETTLED`, `ILLEGAL_TRANSITION` - payment or its
///   reservation cannot reflect the refund.
pub async fn refund(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Path(id): Path<payment::Id>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<Payment>, Error> {
    service
        .execute(command::RefundPayment {
            actor,
            payment_id: id,
            amount: req.amount.into(),
        })
        .await
        .map_err(AsError::into_error)
        .map(|p| Json(p.into()))
}

impl AsError for command::record_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "ALREADY_PAID"]
                #[status = CONFLICT]
                #[message = "Reservation has a payment recorded already"]
                AlreadyPaid,
            }
        }

        Some(match self {
            Self::AlreadyPaid(_) => Error::AlreadyPaid.into(),
            Self::Db(e) => return e.try_as_error(),
            Self::Illegal(_) => illegal_transition(self),
            Self::NotAuthorized(_) => not_authorized(),
            Self::ReservationNotExists(_) => reservation_not_exists(),
        })
    }
}

impl AsError for command::refund_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use payment::RefundError;

        define_error! {
            enum Error {
                #[code = "CURRENCY_MISMATCH"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "Refund amount is expressed in another currency"]
                CurrencyMismatch,

                #[code = "PAYMENT_NOT_SETTLED"]
                #[status = CONFLICT]
                #[message = "Payment is not in a refundable status"]
                NotSettled,

                #[code = "REFUND_EXCEEDS_PAYMENT"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "Accumulated refund would exceed the payment"]
                ExceedsPayment,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::Illegal(_) => illegal_transition(self),
            Self::NotAuthorized(_) => not_authorized(),
            Self::PaymentNotExists(_) => payment_not_exists(),
            Self::Refund(RefundError::CurrencyMismatch(_)) => {
                Error::CurrencyMismatch.into()
            }
            Self::Refund(RefundError::ExceedsPayment { .. }) => {
                Error::ExceedsPayment.into()
            }
            Self::Refund(RefundError::NotSettled { .. }) => {
                Error::NotSettled.into()
            }
            Self::ReservationNotExists(_) => reservation_not_exists(),
            Self::UnitNotExists(_) => return None,
        })
    }
}
