//! # Caller Identity
//!
//! Rollbook authorizes but never authenticates. A gateway in front of the
//! server authenticates the user and forwards who they are in two headers:
//!
//! ```text
//! x-actor-id: t.okafor
//! x-actor-role: teacher
//! ```
//!
//! A request without them is rejected with 401 before any handler runs.

use super::error::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use rollbook_core::{Actor, ActorId, Role};

/// Header carrying the caller's id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the caller's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The caller, as forwarded by the gateway.
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl<S> FromRequestParts<S> for RequestActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?;
        let role = header(parts, ACTOR_ROLE_HEADER)?;

        let id = ActorId::new(id);
        id.validate()?;
        let role: Role = role.parse()?;

        Ok(Self(Actor { id, role }))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", name)))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized(format!("Unreadable {} header", name)))?
        .trim();
    if value.is_empty() {
        return Err(ApiError::unauthorized(format!("Empty {} header", name)));
    }
    Ok(value)
}
