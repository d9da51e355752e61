use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::util::{extract_bearer_token, secrets_match};

/// Identity attached to admin requests. Opaque to this service; sessions and
/// user accounts live in the front end's auth layer.
#[derive(Clone, Debug)]
pub struct AdminContext {
    pub via_dev_mode: bool,
}

fn authenticate_admin(state: &AppState, headers: &HeaderMap) -> Result<AdminContext> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        // No key configured: only dev mode gets in
        if state.dev_mode {
            return Ok(AdminContext { via_dev_mode: true });
        }
        return Err(AppError::Unauthorized);
    };

    let presented = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    if !secrets_match(presented, expected) {
        tracing::debug!("Rejected admin request with wrong key");
        return Err(AppError::Unauthorized);
    }

    Ok(AdminContext {
        via_dev_mode: false,
    })
}

pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let ctx = authenticate_admin(&state, request.headers())?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
