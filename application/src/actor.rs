//! [`Actor`] extraction from trusted gateway headers.
//!
//! Authentication happens upstream: the gateway in front of this server
//! resolves the session and forwards the acting [`User`] in the
//! [`ACTOR_ID_HEADER`] and [`ACTOR_ROLE_HEADER`] headers.
//!
//! [`User`]: service::domain::User

use axum::{async_trait, extract::FromRequestParts};
use service::domain::user::{self, Role};

use crate::{define_error, Error};

/// Header carrying the ID of the acting [`User`].
///
/// [`User`]: service::domain::User
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the [`Role`] of the acting [`User`].
///
/// [`User`]: service::domain::User
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Acting [`User`] of an HTTP request.
///
/// [`User`]: service::domain::User
#[derive(Clone, Copy, Debug)]
pub struct Actor(pub user::Actor);

define_error! {
    enum ExtractionError {
        #[code = "MISSING_ACTOR"]
        #[status = UNAUTHORIZED]
        #[message = "`X-Actor-Id` and `X-Actor-Role` headers must be \
                     provided"]
        Missing,

        #[code = "INVALID_ACTOR"]
        #[status = BAD_REQUEST]
        #[message = "`X-Actor-Id` must be a UUID and `X-Actor-Role` one of \
                     `GUEST`, `HOST` or `ADMIN`"]
        Invalid,
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .ok_or_else(|| Error::from(ExtractionError::Missing))?
                .to_str()
                .map_err(|_| Error::from(ExtractionError::Invalid))
        };

        let id = header(ACTOR_ID_HEADER)?
            .parse::<user::Id>()
            .map_err(|_| Error::from(ExtractionError::Invalid))?;
        let role = match header(ACTOR_ROLE_HEADER)? {
            r if r.eq_ignore_ascii_case("GUEST") => Role::Guest,
            r if r.eq_ignore_ascii_case("HOST") => Role::Host,
            r if r.eq_ignore_ascii_case("ADMIN") => Role::Admin,
            _ => return Err(Error::from(ExtractionError::Invalid)),
        };

        Ok(Self(user::Actor { id, role }))
    }
}
