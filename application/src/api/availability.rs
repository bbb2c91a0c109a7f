//! Availability-related handlers and definitions.

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use common::Date;
use serde::{Deserialize, Serialize};
use service::{
    domain::{
        self,
        availability::Slot,
        inventory::{Kind, Seats, UnitId},
    },
    query, Query as _,
};
use uuid::Uuid;

use crate::{api, define_error, AsError, Error, Service};

/// Availability of a single [`Slot`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Record {
    /// The [`Slot`] itself, as a Unix timestamp.
    pub slot: Slot,

    /// Whether the [`Slot`] may currently be booked.
    pub is_available: bool,

    /// Remaining bookable capacity.
    pub capacity_remaining: Seats,

    /// Per-slot price replacing the unit's base rate, if any.
    pub price_override: Option<api::Money>,
}

impl From<domain::AvailabilityRecord> for Record {
    fn from(record: domain::AvailabilityRecord) -> Self {
        Self {
            slot: record.slot,
            is_available: record.is_available,
            capacity_remaining: record.capacity_remaining,
            price_override: record.price_override.map(Into::into),
        }
    }
}

/// Query string of [`of_unit()`].
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Range {
    /// First date of the range, inclusive.
    pub from: Date,

    /// Last date of the range, exclusive.
    pub to: Date,
}

define_error! {
    enum KindError {
        #[code = "INVALID_UNIT_KIND"]
        #[status = BAD_REQUEST]
        #[message = "Unit kind must be either LISTING or EXPERIENCE"]
        Invalid,
    }
}

/// Handler of `GET /units/{kind}/{id}/availability`.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_UNIT_KIND`, `INVALID_RANGE` - malformed request;
/// - `UNIT_NOT_EXISTS` - unknown unit.
pub async fn of_unit(
    Extension(service): Extension<Service>,
    Path((kind, id)): Path<(String, Uuid)>,
    Query(range): Query<Range>,
) -> Result<Json<Vec<Record>>, Error> {
    let kind = kind
        .to_ascii_uppercase()
        .parse::<Kind>()
        .map_err(|_| KindError::Invalid)?;

    service
        .execute(query::Availability {
            unit_id: UnitId::from_parts(kind, id),
            from: range.from,
            to: range.to,
        })
        .await
        .map_err(AsError::into_error)
        .map(|records| Json(records.into_iter().map(Into::into).collect()))
}

impl AsError for query::availability::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_RANGE"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "`to` date must be after `from` date"]
                InvalidRange,

                #[code = "UNIT_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "Unit with the provided ID does not exist"]
                UnitNotExists,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::InvalidRange(_) => Error::InvalidRange.into(),
            Self::UnitNotExists(_) => Error::UnitNotExists.into(),
        })
    }
}
