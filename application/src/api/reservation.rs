//! [`Reservation`]-related handlers and definitions.

use axum::{extract::Path, Extension, Json};
use common::Date;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::{
        self,
        availability::Slot,
        inventory::{Kind, Span, UnitId},
        reservation, user,
    },
    query, Command as _, Query as _,
};
use uuid::Uuid;

use crate::{actor::Actor, api, define_error, AsError, Error, Service};

/// Kind of a bookable unit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    /// A nightly stay listing.
    Listing,

    /// A timed group experience.
    Experience,
}

impl From<Kind> for UnitKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Listing => Self::Listing,
            Kind::Experience => Self::Experience,
        }
    }
}

impl From<UnitKind> for Kind {
    fn from(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Listing => Self::Listing,
            UnitKind::Experience => Self::Experience,
        }
    }
}

/// Status of a [`Reservation`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Awaiting host confirmation.
    Pending,

    /// Confirmed by the host.
    Confirmed,

    /// Cancelled by its guest.
    CancelledByGuest,

    /// Cancelled by the host or an admin.
    CancelledByHost,

    /// Stay or session has elapsed.
    Completed,

    /// Guest never showed up.
    NoShow,

    /// Paid by its guest.
    Paid,

    /// Fully refunded.
    Refunded,
}

impl From<reservation::Status> for Status {
    fn from(status: reservation::Status) -> Self {
        use reservation::Status as S;

        match status {
            S::Pending => Self::Pending,
            S::Confirmed => Self::Confirmed,
            S::CancelledByGuest => Self::CancelledByGuest,
            S::CancelledByHost => Self::CancelledByHost,
            S::Completed => Self::Completed,
            S::NoShow => Self::NoShow,
            S::Paid => Self::Paid,
            S::Refunded => Self::Refunded,
        }
    }
}

/// A reservation of a unit.
#[derive(Clone, Debug, Serialize)]
pub struct Reservation {
    /// ID of this [`Reservation`].
    pub id: reservation::Id,

    /// ID of the guest who placed this [`Reservation`].
    pub guest_id: user::Id,

    /// Kind of the booked unit.
    pub unit_kind: UnitKind,

    /// ID of the booked unit.
    pub unit_id: Uuid,

    /// First booked night, for a listing.
    pub check_in: Option<Date>,

    /// Check-out date, for a listing.
    pub check_out: Option<Date>,

    /// Booked session, for an experience.
    pub starts_at: Option<Slot>,

    /// Number of guests or attendees.
    pub party_size: u16,

    /// [`Status`] of this [`Reservation`].
    pub status: Status,

    /// Total quoted price.
    pub total_price: api::Money,

    /// `DateTime` this [`Reservation`] was placed at, as a Unix timestamp.
    #[serde(with = "common::datetime::serde::unix_timestamp")]
    pub created_at: reservation::CreationDateTime,
}

impl From<domain::Reservation> for Reservation {
    fn from(reservation: domain::Reservation) -> Self {
        let (check_in, check_out, starts_at) = match reservation.span {
            Span::Nights {
                check_in,
                check_out,
            } => (Some(check_in), Some(check_out), None),
            Span::Session { starts_at } => {
                (None, None, Some(Slot::from(starts_at)))
            }
        };
        Self {
            id: reservation.id,
            guest_id: reservation.guest_id,
            unit_kind: reservation.unit_id.kind().into(),
            unit_id: reservation.unit_id.uuid(),
            check_in,
            check_out,
            starts_at,
            party_size: reservation.party_size,
            status: reservation.status.into(),
            total_price: reservation.total_price.into(),
            created_at: reservation.created_at,
        }
    }
}

/// Request body for [`create()`].
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct CreateRequest {
    /// Kind of the unit to book.
    pub unit_kind: UnitKind,

    /// ID of the unit to book.
    pub unit_id: Uuid,

    /// First night of a listing stay, inclusive.
    pub check_in: Option<Date>,

    /// Check-out date of a listing stay, exclusive.
    pub check_out: Option<Date>,

    /// Experience session to attend, as a Unix timestamp.
    pub starts_at: Option<Slot>,

    /// Number of guests or attendees.
    pub party_size: u16,
}

define_error! {
    enum SpanError {
        #[code = "INVALID_SPAN"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "`check_in`/`check_out` must be provided for a LISTING, \
                     `starts_at` for an EXPERIENCE"]
        Invalid,

        #[code = "INVALID_RANGE"]
        #[status = UNPROCESSABLE_ENTITY]
        #[message = "`check_out` must be after `check_in`"]
        InvalidRange,
    }
}

impl CreateRequest {
    /// Converts this [`CreateRequest`] into a [`command::CreateReservation`]
    /// placed by the provided `actor`.
    fn into_command(
        self,
        actor: user::Actor,
    ) -> Result<command::CreateReservation, Error> {
        let Self {
            unit_kind,
            unit_id,
            check_in,
            check_out,
            starts_at,
            party_size,
        } = self;

        let span = match unit_kind {
            UnitKind::Listing => {
                let (check_in, check_out) =
                    check_in.zip(check_out).ok_or(SpanError::Invalid)?;
                Span::nights(check_in, check_out)
                    .map_err(|_| SpanError::InvalidRange)?
            }
            UnitKind::Experience => {
                Span::session(starts_at.ok_or(SpanError::Invalid)?.into())
            }
        };

        Ok(command::CreateReservation {
            actor,
            unit_id: UnitId::from_parts(unit_kind.into(), unit_id),
            span,
            party_size,
        })
    }
}

/// Handler of `POST /reservations`.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_SPAN`, `INVALID_RANGE`, `PARTY_TOO_LARGE` - malformed booking
///   request;
/// - `UNIT_NOT_EXISTS`, `USER_NOT_EXISTS` - unknown unit or actor;
/// - `SLOTS_UNAVAILABLE`, `INSUFFICIENT_CAPACITY` - booking conflict.
pub async fn create(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Reservation>), Error> {
    service
        .execute(req.into_command(actor)?)
        .await
        .map_err(AsError::into_error)
        .map(|r| (StatusCode::CREATED, Json(r.into())))
}

/// Handler of `GET /reservations/{id}`.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_AUTHORIZED` - reservation belongs to another guest;
/// - `RESERVATION_NOT_EXISTS` - unknown reservation.
pub async fn get(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Path(id): Path<reservation::Id>,
) -> Result<Json<Reservation>, Error> {
    let reservation = service
        .execute(query::reservation::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(reservation_not_exists)?;

    if actor.role == user::Role::Guest && reservation.guest_id != actor.id {
        return Err(not_authorized());
    }
    Ok(Json(reservation.into()))
}

/// Handler of `POST /reservations/{id}/confirm`.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_AUTHORIZED` - actor may not confirm this reservation;
/// - `RESERVATION_NOT_EXISTS` - unknown reservation;
/// - `ILLEGAL_TRANSITION` - reservation is not `PENDING`.
pub async fn confirm(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Path(id): Path<reservation::Id>,
) -> Result<Json<Reservation>, Error> {
    service
        .execute(command::ConfirmReservation {
            actor,
            reservation_id: id,
        })
        .await
        .map_err(AsError::into_error)
        .map(|r| Json(r.into()))
}

/// Handler of `POST /reservations/{id}/cancel`.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_AUTHORIZED` - actor may not cancel this reservation;
/// - `RESERVATION_NOT_EXISTS` - unknown reservation;
/// - `ILLEGAL_TRANSITION` - reservation is in a terminal state already.
pub async fn cancel(
    Extension(service): Extension<Service>,
    Actor(actor): Actor,
    Path(id): Path<reservation::Id>,
) -> Result<Json<Reservation>, Error> {
    service
        .execute(command::CancelReservation {
            actor,
            reservation_id: id,
        })
        .await
        .map_err(AsError::into_error)
        .map(|r| Json(r.into()))
}

impl AsError for command::create_reservation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        use service::domain::availability::ClaimError;

        define_error! {
            enum Error {
                #[code = "INSUFFICIENT_CAPACITY"]
                #[status = CONFLICT]
                #[message = "Requested session lacks enough remaining seats"]
                InsufficientCapacity,

                #[code = "INVALID_SPAN"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "Requested span does not match the unit kind"]
                SpanMismatch,

                #[code = "INVALID_QUOTE"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "Requested span or party cannot be quoted"]
                Quote,

                #[code = "PARTY_TOO_LARGE"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "Requested party exceeds the unit capacity"]
                PartyTooLarge,

                #[code = "SLOTS_UNAVAILABLE"]
                #[status = CONFLICT]
                #[message = "Some of the requested slots are already booked"]
                SlotsUnavailable,

                #[code = "UNIT_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "Unit with the provided ID does not exist"]
                UnitNotExists,

                #[code = "USER_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`User` with the provided ID does not exist"]
                UserNotExists,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::Claim(ClaimError::InsufficientCapacity { .. }) => {
                Error::InsufficientCapacity.into()
            }
            Self::Claim(e @ ClaimError::SlotsUnavailable(_)) => {
                let mut error = crate::Error::from(Error::SlotsUnavailable);
                // Name the conflicting slots for the client.
                error.message = e.to_string();
                error
            }
            Self::PartyTooLarge { .. } => Error::PartyTooLarge.into(),
            Self::Quote(_) => Error::Quote.into(),
            Self::SpanMismatch { .. } => Error::SpanMismatch.into(),
            Self::UnitNotExists(_) => Error::UnitNotExists.into(),
            Self::UserNotExists(_) => Error::UserNotExists.into(),
        })
    }
}

impl AsError for command::confirm_reservation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::Illegal(_) => illegal_transition(self),
            Self::NotAuthorized(_) => not_authorized(),
            Self::ReservationNotExists(_) => reservation_not_exists(),
            Self::UnitNotExists(_) => return None,
        })
    }
}

impl AsError for command::cancel_reservation::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::Illegal(_) => illegal_transition(self),
            Self::NotAuthorized(_) => not_authorized(),
            Self::ReservationNotExists(_) => reservation_not_exists(),
            Self::UnitNotExists(_) => return None,
        })
    }
}

/// [`Error`] for an illegal [`Status`] transition, carrying the attempted
/// transition in its message.
pub(crate) fn illegal_transition(source: &impl ToString) -> Error {
    Error {
        code: "ILLEGAL_TRANSITION",
        status_code: StatusCode::CONFLICT,
        message: source.to_string(),
        backtrace: None,
    }
}

/// [`Error`] for an actor lacking the privilege for an operation.
pub(crate) fn not_authorized() -> Error {
    Error {
        code: "NOT_AUTHORIZED",
        status_code: StatusCode::FORBIDDEN,
        message: "Actor is not allowed to perform this operation".into(),
        backtrace: None,
    }
}

/// [`Error`] for a [`Reservation`] missing in the storage.
pub(crate) fn reservation_not_exists() -> Error {
    Error {
        code: "RESERVATION_NOT_EXISTS",
        status_code: StatusCode::NOT_FOUND,
        message: "Reservation with the provided ID does not exist".into(),
        backtrace: None,
    }
}
