//! Host-related handlers and definitions.

use axum::{extract::Path, Extension, Json};
use serde::Serialize;
use service::{domain::user, query, read, Query as _};

use crate::{api, define_error, AsError, Error, Service};

/// Settled earnings of a host.
#[derive(Clone, Debug, Serialize)]
pub struct Earnings {
    /// Net totals, one per currency the host was paid in.
    pub totals: Vec<api::Money>,

    /// Number of settled payments the totals are built from.
    pub payments_count: i64,
}

impl From<read::Earnings> for Earnings {
    fn from(earnings: read::Earnings) -> Self {
        Self {
            totals: earnings.totals.into_iter().map(Into::into).collect(),
            payments_count: earnings.payments_count,
        }
    }
}

/// Handler of `GET /hosts/{id}/earnings`.
///
/// # Errors
///
/// Possible error codes:
/// - `USER_NOT_EXISTS` - unknown host.
pub async fn earnings(
    Extension(service): Extension<Service>,
    Path(id): Path<user::Id>,
) -> Result<Json<Earnings>, Error> {
    service
        .execute(query::Earnings { host_id: id })
        .await
        .map_err(AsError::into_error)
        .map(|e| Json(e.into()))
}

impl AsError for query::report::earnings::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "USER_NOT_EXISTS"]
                #[status = NOT_FOUND]
                #[message = "`User` with the provided ID does not exist"]
                UserNotExists,
            }
        }

        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::UserNotExists(_) => Error::UserNotExists.into(),
        })
    }
}
