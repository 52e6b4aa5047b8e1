use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use desk_orchestrator::UserId;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Auth middleware - extracts the user from authenticating proxy headers
///
/// Token verification happens in the proxy deployed in front of desk-api,
/// which sets X-Desk-User to the verified user id.
///
/// For local development without a proxy, we fall back to the x-user header.
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let raw = req
        .headers()
        .get("x-desk-user")
        .or_else(|| req.headers().get("x-forwarded-user")) // oauth2-proxy format
        .or_else(|| req.headers().get("x-user")) // fallback for dev
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    // If no user, return 401
    let raw = raw.ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = UserId::new(raw).map_err(|e| {
        debug!("Rejecting user header: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    req.extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(req).await)
}
