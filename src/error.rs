//! Error taxonomy and transport mappings.

use std::time::Duration;

use axum::{http::StatusCode, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::boards::repository::RepositoryError;
use crate::cache::CacheError;

/// Failures while decoding or verifying a session token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid jwt token")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Rejections of a request before any downstream call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("token is not present")]
    MissingToken,
    #[error("profile is not present")]
    MissingProfile,
    #[error("invalid jwt token: UserID is invalid")]
    InvalidUserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamCall {
    AccountDetails,
    ProfileValidation,
    Authentication,
}

impl std::fmt::Display for UpstreamCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamCall::AccountDetails => write!(f, "error fetching account details"),
            UpstreamCall::ProfileValidation => write!(f, "error validating profile"),
            UpstreamCall::Authentication => write!(f, "error authenticating account"),
        }
    }
}

/// Failures of calls made to the People service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("error fetching account details: {0}")]
    AccountFetchFailed(String),
    #[error("error validating profile: {0}")]
    ProfileValidationFailed(String),
    #[error("error validating profile: profile is invalid")]
    ProfileInvalid,
    #[error("error authenticating account: {0}")]
    AuthenticationFailed(String),
    #[error("{call}: timed out after {after:?}")]
    Timeout { call: UpstreamCall, after: Duration },
}

impl UpstreamError {
    pub fn call(&self) -> UpstreamCall {
        match self {
            UpstreamError::AccountFetchFailed(_) => UpstreamCall::AccountDetails,
            UpstreamError::ProfileValidationFailed(_) | UpstreamError::ProfileInvalid => {
                UpstreamCall::ProfileValidation
            }
            UpstreamError::AuthenticationFailed(_) => UpstreamCall::Authentication,
            UpstreamError::Timeout { call, .. } => *call,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("profile does not have the required role on this board")]
    RoleNotPermitted,
    #[error("unable to find board {0}")]
    BoardNotFound(String),
    #[error("invalid board id: {0}")]
    InvalidBoardId(String),
    #[error("{0}")]
    MembershipConflict(String),
    #[error("Cannot delete board, contains another Board.")]
    BoardHasChildren(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for tonic::Status {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::Validation(_) => Self::invalid_argument(message),
            AuthError::Token(TokenError::Signing(_)) => Self::internal(message),
            AuthError::Token(_) => Self::unauthenticated(message),
            AuthError::Upstream(UpstreamError::Timeout { .. }) => Self::deadline_exceeded(message),
            AuthError::Upstream(UpstreamError::ProfileInvalid) => {
                Self::permission_denied(message)
            }
            AuthError::Upstream(_) => Self::unavailable(message),
            AuthError::Authorization(AuthorizationError::BoardNotFound(_)) => {
                Self::not_found(message)
            }
            AuthError::Authorization(AuthorizationError::InvalidBoardId(_)) => {
                Self::invalid_argument(message)
            }
            AuthError::Authorization(
                AuthorizationError::MembershipConflict(_) | AuthorizationError::BoardHasChildren(_),
            ) => Self::failed_precondition(message),
            AuthError::Authorization(_) => Self::permission_denied(message),
            AuthError::Cache(_) | AuthError::Repository(_) => {
                error!(error = %message, "Internal failure surfaced over gRPC");
                Self::internal("internal error")
            }
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[schema(example = "invalid token")]
    pub error: String,
    #[schema(example = "INVALID_TOKEN")]
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(error, code)))
    }

    pub fn unauthorized(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(error, code)))
    }

    pub fn forbidden(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::FORBIDDEN, Json(Self::new(error, code)))
    }

    pub fn not_found(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(error, code)))
    }

    pub fn conflict(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::CONFLICT, Json(Self::new(error, code)))
    }
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Maps a core error to an HTTP response without leaking internal detail.
impl From<AuthError> for (StatusCode, Json<ApiError>) {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::Validation(v) => ApiError::bad_request(v.to_string(), "VALIDATION_ERROR"),
            AuthError::Token(TokenError::Expired) => {
                ApiError::unauthorized("token has expired", "TOKEN_EXPIRED")
            }
            AuthError::Token(_) => ApiError::unauthorized("invalid token", "INVALID_TOKEN"),
            AuthError::Upstream(UpstreamError::ProfileInvalid) => {
                ApiError::unauthorized("Invalid profile", "INVALID_PROFILE")
            }
            AuthError::Authorization(AuthorizationError::RoleNotPermitted) => {
                ApiError::forbidden("operation not permitted", "ROLE_NOT_PERMITTED")
            }
            AuthError::Authorization(AuthorizationError::BoardNotFound(_)) => {
                ApiError::not_found("board not found", "BOARD_NOT_FOUND")
            }
            AuthError::Authorization(AuthorizationError::InvalidBoardId(_)) => {
                ApiError::bad_request("invalid board id", "INVALID_BOARD_ID")
            }
            AuthError::Authorization(AuthorizationError::MembershipConflict(reason)) => {
                ApiError::conflict(reason.clone(), "MEMBERSHIP_CONFLICT")
            }
            AuthError::Authorization(e @ AuthorizationError::BoardHasChildren(_)) => {
                ApiError::conflict(e.to_string(), "BOARD_HAS_CHILDREN")
            }
            _ => {
                warn!(error = %err, "Request failed");
                ApiError::bad_request("server failed to process request", "REQUEST_FAILED")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keep_wire_wording() {
        assert_eq!(ValidationError::MissingToken.to_string(), "token is not present");
        assert_eq!(ValidationError::MissingProfile.to_string(), "profile is not present");
        assert_eq!(TokenError::SignatureInvalid.to_string(), "invalid jwt token");
    }

    #[test]
    fn test_timeout_references_its_call() {
        let err = UpstreamError::Timeout {
            call: UpstreamCall::ProfileValidation,
            after: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("validating profile"));
        assert_eq!(err.call(), UpstreamCall::ProfileValidation);
    }

    #[test]
    fn test_grpc_status_codes() {
        let status: tonic::Status = AuthError::from(ValidationError::MissingToken).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = AuthError::from(TokenError::Expired).into();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let status: tonic::Status = AuthError::from(UpstreamError::Timeout {
            call: UpstreamCall::AccountDetails,
            after: Duration::from_secs(5),
        })
        .into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }

    #[test]
    fn test_http_mapping_hides_internal_detail() {
        let (status, Json(body)) =
            AuthError::from(UpstreamError::AccountFetchFailed("connection refused".into())).into();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.error.contains("connection refused"));

        let (status, _) = AuthError::from(ValidationError::MissingProfile).into();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, Json(body)) =
            AuthError::from(AuthorizationError::BoardHasChildren("0a".into())).into();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "BOARD_HAS_CHILDREN");
    }
}
