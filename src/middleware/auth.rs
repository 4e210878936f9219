use crate::common::response::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims the identity provider puts in its access tokens. Only the subject
/// matters here; privileges are looked up separately.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract token from header
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| {
            if auth_value.starts_with("Bearer ") {
                Some(auth_value[7..].to_owned())
            } else {
                None
            }
        });

    let token = match token {
        Some(t) => t,
        None => return Err(ApiError::new("missing_authorization", StatusCode::UNAUTHORIZED)),
    };

    // 2. Check if token has been revoked
    let mut redis = state
        .redis
        .get_conn()
        .await
        .map_err(|_| ApiError::new("internal_error", StatusCode::INTERNAL_SERVER_ERROR))?;

    let is_blocked: bool = redis
        .exists(format!("blocked_token:{}", token))
        .await
        .map_err(|_| ApiError::new("internal_error", StatusCode::INTERNAL_SERVER_ERROR))?;

    if is_blocked {
        return Err(ApiError::new("invalid_token", StatusCode::UNAUTHORIZED));
    }

    // 3. Verify JWT
    let secret = &state.config.jwt_secret;

    let claims = decode::<TokenClaims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::new("invalid_token", StatusCode::UNAUTHORIZED))?
    .claims;

    // 4. Inject claims into request extensions
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
