use crate::common::response::ApiError;
use crate::middleware::auth::TokenClaims;
use crate::state::AppState;
use axum::{
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Uploads are restricted to administrators. The flag lives in the
/// authorization store, not in the token.
pub async fn admin_guard(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let is_admin: Option<bool> =
        sqlx::query_scalar("SELECT is_admin FROM user_profiles WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&state.db)
            .await
            .map_err(|e| {
                tracing::error!("Admin lookup failed for {}: {}", claims.sub, e);
                ApiError::new("internal_error", StatusCode::INTERNAL_SERVER_ERROR)
            })?;

    if !is_admin.unwrap_or(false) {
        return Err(ApiError::new("admin_required", StatusCode::FORBIDDEN));
    }

    Ok(next.run(req).await)
}
