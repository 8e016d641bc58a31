//! Login and current-user handlers.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult, AuthError, UpstreamError},
    grpc::people::{AccountDetails, Credentials},
    middleware::AuthenticatedUser,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[serde(default)]
    #[schema(example = "ada")]
    pub user_name: String,
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginData {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = 1)]
    pub status: i32,
    #[schema(example = "Login successful.")]
    pub message: String,
    pub data: LoginData,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub account: AccountDetails,
    #[schema(example = 42)]
    pub profile_id: i64,
}

fn session_cookie(name: &str, token: &str, expires: DateTime<Utc>) -> Option<HeaderValue> {
    let value = format!(
        "{name}={token}; Path=/; Expires={}; HttpOnly; SameSite=Lax",
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    HeaderValue::from_str(&value).ok()
}

#[utoipa::path(
    post,
    path = "/auth",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = LoginResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.password.is_empty() || (payload.email.is_empty() && payload.user_name.is_empty()) {
        return Err(ApiError::bad_request(
            "email or userName and password are required",
            "VALIDATION_ERROR",
        ));
    }

    let (account, issued) = state
        .validator
        .login(Credentials {
            email: payload.email,
            user_name: payload.user_name,
            password: payload.password,
        })
        .await
        .map_err(|e| match e {
            AuthError::Upstream(UpstreamError::AuthenticationFailed(reason)) => {
                warn!(reason = %reason, "Login rejected");
                ApiError::unauthorized("Invalid credentials", "INVALID_CREDENTIALS")
            }
            other => other.into(),
        })?;

    let cookie = session_cookie(&state.auth_cookie, &issued.value, issued.expires_at)
        .ok_or_else(|| ApiError::bad_request("server failed to process request", "REQUEST_FAILED"))?;

    info!(account_id = account.id, "Session issued");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(LoginResponse {
            status: 1,
            message: "Login successful.".to_string(),
            data: LoginData {
                id: account.id,
                email: account.email,
                token: issued.value,
                expires: issued.expires_at,
            },
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    params(
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    responses(
        (status = 200, description = "Current account", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        account: user.account,
        profile_id: user.profile.0,
    })
}
