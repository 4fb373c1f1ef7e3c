use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use shared_models::auth::CurrentUser;
use shared_models::error::AppError;

use crate::jwt::validate_token;
use crate::state::AppState;

fn bearer_token(request: &Request<Body>) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = request.headers().get("Authorization") else {
        return Ok(None);
    };

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Requires a valid bearer token with a staff role and puts the `User` into
/// request extensions.
pub async fn staff_only(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let user = validate_token(token, &state.config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    if !user.is_staff() {
        debug!("User {} with role {:?} denied staff access", user.id, user.role);
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Public routes: a valid token identifies the caller, no token means guest.
/// A token that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let current = match bearer_token(&request)? {
        Some(token) => Some(
            validate_token(token, &state.config.supabase_jwt_secret).map_err(AppError::Auth)?,
        ),
        None => None,
    };

    request.extensions_mut().insert(CurrentUser(current));

    Ok(next.run(request).await)
}
