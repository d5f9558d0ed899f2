use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::{error::CoreError, AppError};

use super::{Gate, Identity};

/// Extractor for the verified caller of a REST endpoint. Never trusts a
/// user id from the request itself.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    Gate: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Gate::from_ref(state);
        let token = bearer_token(&parts.headers)
            .ok_or(CoreError::Unauthenticated)?
            .to_owned();

        Ok(Caller(gate.verify(&token).await?))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
