//! Board lifecycle, role lookups and permission checks for the calling
//! profile.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    boards::{Board, BoardId, Role, Visibility},
    cache::PermissionCache,
    error::{ApiError, ApiResult, AuthError, AuthorizationError},
    middleware::AuthenticatedUser,
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardRoleResponse {
    #[schema(example = "65a1f0c2e4b0a1b2c3d4e5f6")]
    pub board_id: String,
    #[schema(example = 42)]
    pub profile_id: i64,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionCheckRequest {
    pub roles: Vec<Role>,
    /// Treat `roles` as the forbidden set instead of the required one.
    #[serde(default)]
    pub disallow: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub allowed: bool,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBoardRequest {
    /// Parent board. The caller must be its owner, an admin or an author.
    #[serde(default, rename = "parentID")]
    #[schema(example = "65a1f0c2e4b0a1b2c3d4e5f6")]
    pub parent_id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "MEMBERS")]
    pub visible: Visibility,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardResponse {
    #[schema(example = "65a1f0c2e4b0a1b2c3d4e5f6")]
    pub board_id: String,
    pub role: Role,
}

/// Roles allowed to nest a board under an existing one.
const NESTING_ROLES: &[Role] = &[Role::Owner, Role::Admin, Role::Author];

pub(crate) fn parse_board_id(raw: &str) -> ApiResult<BoardId> {
    raw.parse::<BoardId>()
        .map_err(|e| AuthError::from(e).into())
}

#[utoipa::path(
    get,
    path = "/boards/{board_id}/role",
    tag = "Boards",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    responses(
        (status = 200, description = "Effective role on the board", body = BoardRoleResponse),
        (status = 400, description = "Invalid board id", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Board not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_board_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
) -> ApiResult<Json<BoardRoleResponse>> {
    let board_id = parse_board_id(&board_id)?;
    let board = state.gate.load_board(board_id).await?;

    let role = state
        .resolver
        .resolve_role(&PermissionCache::key_for(user.profile), &board, user.profile)
        .await?;

    Ok(Json(BoardRoleResponse {
        board_id: board_id.to_hex(),
        profile_id: user.profile.0,
        role,
    }))
}

#[utoipa::path(
    post,
    path = "/boards/{board_id}/permissions/check",
    tag = "Boards",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    request_body = PermissionCheckRequest,
    responses(
        (status = 200, description = "Check result", body = PermissionCheckResponse),
        (status = 400, description = "Invalid board id or role set", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Board not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_board_permission(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
    Json(payload): Json<PermissionCheckRequest>,
) -> ApiResult<Json<PermissionCheckResponse>> {
    let board_id = parse_board_id(&board_id)?;
    if payload.roles.is_empty() {
        return Err(ApiError::bad_request("roles must not be empty", "VALIDATION_ERROR"));
    }

    let decision = state
        .gate
        .decide(user.profile, board_id, &payload.roles, payload.disallow)
        .await?;

    debug!(board_id = %board_id, allowed = decision.allowed, "Board permission checked");
    Ok(Json(PermissionCheckResponse {
        allowed: decision.allowed,
        role: decision.role.external(),
    }))
}

#[utoipa::path(
    post,
    path = "/boards",
    tag = "Boards",
    params(
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    request_body = CreateBoardRequest,
    responses(
        (status = 201, description = "Board created, caller is its owner", body = CreateBoardResponse),
        (status = 400, description = "Invalid parent id", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Caller may not nest under the parent", body = ApiError),
        (status = 404, description = "Parent board not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_board(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateBoardRequest>,
) -> ApiResult<(StatusCode, Json<CreateBoardResponse>)> {
    let mut board = Board::new(BoardId::generate(), user.profile);
    board.visible = payload.visible;

    if let Some(parent) = payload.parent_id.as_deref().filter(|p| !p.is_empty()) {
        let parent = parse_board_id(parent)?;
        state
            .gate
            .require(user.profile, parent, NESTING_ROLES, false)
            .await?;
        board = board.with_parent(parent);
    }

    let board_id = board.id;
    state.propagator.on_board_created(board).await?;

    info!(board_id = %board_id, owner = %user.profile, "Board created");
    Ok((
        StatusCode::CREATED,
        Json(CreateBoardResponse {
            board_id: board_id.to_hex(),
            role: Role::Owner,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/boards/{board_id}",
    tag = "Boards",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    responses(
        (status = 204, description = "Board deleted"),
        (status = 400, description = "Invalid board id", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Caller is not the owner", body = ApiError),
        (status = 404, description = "Board not found", body = ApiError),
        (status = 409, description = "Board still has child boards", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_board(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
) -> ApiResult<StatusCode> {
    let board_id = parse_board_id(&board_id)?;
    let board = state
        .boards
        .find_by_id(board_id)
        .await
        .map_err(AuthError::from)?
        .ok_or_else(|| AuthError::from(AuthorizationError::BoardNotFound(board_id.to_hex())))?;
    if board.owner != user.profile {
        return Err(AuthError::from(AuthorizationError::RoleNotPermitted).into());
    }

    if !state.propagator.on_board_deleted(board_id).await? {
        return Err(AuthError::from(AuthorizationError::BoardNotFound(board_id.to_hex())).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
