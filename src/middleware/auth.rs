//! Bearer authentication middleware.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::auth::TokenClaims;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
}

impl From<TokenClaims> for AuthUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.user_id,
            email: claims.email,
        }
    }
}

pub fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = bearer_token(&req).ok_or_else(|| {
        ApiError::unauthorized("Missing or malformed authorization header", "UNAUTHENTICATED")
            .into_response()
    })?;

    let claims = state.token_issuer.verify_token(token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        ApiError::unauthorized("Invalid or expired token", "INVALID_TOKEN").into_response()
    })?;

    req.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(req).await)
}
