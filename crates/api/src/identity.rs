//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity as `X-User-Id` and `X-User-Role` headers, which are trusted
//! verbatim here.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Caller, Role, UserId};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .parse::<u64>()
            .ok()
            .and_then(|id| i64::try_from(id).ok())
            .map(UserId::new)
            .ok_or_else(|| ApiError::Unauthorized("invalid X-User-Id header".to_string()))?;

        let role: Role = header(parts, USER_ROLE_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthorized("invalid X-User-Role header".to_string()))?;

        Ok(Authenticated(Caller::new(user_id, role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| {
            tracing::warn!(header = name, uri = %parts.uri, "missing identity header");
            ApiError::Unauthorized(format!("missing {name} header"))
        })?;

    value
        .to_str()
        .map(str::trim)
        .map_err(|_| ApiError::Unauthorized(format!("malformed {name} header")))
}
