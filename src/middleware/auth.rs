//! Authentication middleware for protected routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::boards::ProfileId;
use crate::error::ApiError;
use crate::grpc::people::AccountDetails;
use crate::AppState;

pub const PROFILE_HEADER: &str = "profile";

/// The validated caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub account: AccountDetails,
    pub profile: ProfileId,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// Token lookup order: a header named after the cookie, `Authorization:
/// Bearer`, then the cookie itself.
pub fn extract_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get(cookie_name)
        .and_then(|v| v.to_str().ok())
        .or_else(|| bearer(headers))
        .or_else(|| cookie(headers, cookie_name))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn extract_profile(headers: &HeaderMap) -> Option<i32> {
    headers
        .get(PROFILE_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Runs `ValidateUser` with profile validation and stores the caller.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(req.headers(), &state.auth_cookie)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized", "MISSING_TOKEN").into_response())?
        .to_string();

    let profile = extract_profile(req.headers()).ok_or_else(|| {
        ApiError::unauthorized("Invalid profile", "INVALID_PROFILE").into_response()
    })?;

    let account = state
        .validator
        .validate(&token, profile, true)
        .await
        .map_err(|e| {
            let (status, body): (StatusCode, Json<ApiError>) = e.into();
            (status, body).into_response()
        })?;

    req.extensions_mut().insert(AuthenticatedUser {
        account,
        profile: ProfileId(i64::from(profile)),
    });
    Ok(next.run(req).await)
}
