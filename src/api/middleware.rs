use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;

use super::server::AppState;
use crate::util::constant_time_cmp;

/// Rejects requests whose `Authorization` header doesn't carry the configured API token.
///
/// Both `<token>` and `Bearer <token>` are accepted. Without a configured token every request
/// passes.
pub async fn verify_internal_ident(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let token = provided.strip_prefix("Bearer ").unwrap_or(provided);
    if !constant_time_cmp(token, expected) {
        tracing::warn!("rejected request with invalid api token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}
