//! Membership changes on a board. Everything except following is limited to
//! the board's owner and admins.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::boards::parse_board_id;
use crate::{
    boards::{ProfileId, Role},
    error::{ApiError, ApiResult},
    middleware::AuthenticatedUser,
    AppState,
};

const MANAGERS: &[Role] = &[Role::Owner, Role::Admin];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    #[schema(example = 42)]
    pub profile_id: i64,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfilesRequest {
    #[schema(example = json!([42, 43]))]
    pub profiles: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub profile_id: i64,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnblockResponse {
    pub unblocked: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowResponse {
    /// False when the call changed nothing.
    pub changed: bool,
}

fn profiles(payload: &ProfilesRequest) -> ApiResult<Vec<ProfileId>> {
    if payload.profiles.is_empty() {
        return Err(ApiError::bad_request("profiles must not be empty", "VALIDATION_ERROR"));
    }
    Ok(payload.profiles.iter().copied().map(ProfileId).collect())
}

#[utoipa::path(
    post,
    path = "/boards/{board_id}/members",
    tag = "Members",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = MemberResponse),
        (status = 403, description = "Caller does not manage the board", body = ApiError),
        (status = 404, description = "Board not found", body = ApiError),
        (status = 409, description = "Already a member, blocked, or role not grantable", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
    Json(payload): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    let board_id = parse_board_id(&board_id)?;
    state.gate.require(user.profile, board_id, MANAGERS, false).await?;

    let role = state
        .membership
        .accept_invite(board_id, ProfileId(payload.profile_id), payload.role)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            profile_id: payload.profile_id,
            role,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/boards/{board_id}/members/{profile_id}/role",
    tag = "Members",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("profile_id" = i64, Path, description = "Member whose role changes"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = MemberResponse),
        (status = 403, description = "Caller does not manage the board", body = ApiError),
        (status = 409, description = "Target is the owner, blocked or not a member", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_member_role(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((board_id, profile_id)): Path<(String, i64)>,
    Json(payload): Json<ChangeRoleRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let board_id = parse_board_id(&board_id)?;
    let role = state
        .membership
        .change_role(user.profile, board_id, ProfileId(profile_id), payload.role)
        .await?;
    Ok(Json(MemberResponse { profile_id, role }))
}

#[utoipa::path(
    delete,
    path = "/boards/{board_id}/members/{profile_id}",
    tag = "Members",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("profile_id" = i64, Path, description = "Member to remove"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Caller does not manage the board", body = ApiError),
        (status = 409, description = "Target is the owner", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((board_id, profile_id)): Path<(String, i64)>,
) -> ApiResult<StatusCode> {
    let board_id = parse_board_id(&board_id)?;
    state
        .membership
        .remove(user.profile, board_id, &[ProfileId(profile_id)])
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/boards/{board_id}/block",
    tag = "Members",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    request_body = ProfilesRequest,
    responses(
        (status = 204, description = "Profiles blocked"),
        (status = 400, description = "Empty profile list", body = ApiError),
        (status = 403, description = "Caller does not manage the board", body = ApiError),
        (status = 409, description = "Owner cannot be blocked", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn block_profiles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
    Json(payload): Json<ProfilesRequest>,
) -> ApiResult<StatusCode> {
    let board_id = parse_board_id(&board_id)?;
    let targets = profiles(&payload)?;
    state.membership.block(user.profile, board_id, &targets).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/boards/{board_id}/unblock",
    tag = "Members",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    request_body = ProfilesRequest,
    responses(
        (status = 200, description = "Profiles that were blocked and now have no role", body = UnblockResponse),
        (status = 400, description = "Empty profile list", body = ApiError),
        (status = 403, description = "Caller does not manage the board", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn unblock_profiles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
    Json(payload): Json<ProfilesRequest>,
) -> ApiResult<Json<UnblockResponse>> {
    let board_id = parse_board_id(&board_id)?;
    let targets = profiles(&payload)?;
    let unblocked = state
        .membership
        .unblock(user.profile, board_id, &targets)
        .await?;
    Ok(Json(UnblockResponse {
        unblocked: unblocked.into_iter().map(|p| p.0).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/boards/{board_id}/follow",
    tag = "Members",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    responses(
        (status = 200, description = "Following the board", body = FollowResponse),
        (status = 403, description = "Blocked on the board", body = ApiError),
        (status = 404, description = "Board not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn follow_board(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
) -> ApiResult<Json<FollowResponse>> {
    let board_id = parse_board_id(&board_id)?;
    let changed = state.membership.follow(board_id, user.profile).await?;
    Ok(Json(FollowResponse { changed }))
}

#[utoipa::path(
    delete,
    path = "/boards/{board_id}/follow",
    tag = "Members",
    params(
        ("board_id" = String, Path, description = "Board id (24 hex characters)"),
        ("Profile" = i32, Header, description = "Profile acting for the account")
    ),
    responses(
        (status = 200, description = "No longer following the board", body = FollowResponse),
        (status = 404, description = "Board not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn unfollow_board(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(board_id): Path<String>,
) -> ApiResult<Json<FollowResponse>> {
    let board_id = parse_board_id(&board_id)?;
    let changed = state.membership.unfollow(board_id, user.profile).await?;
    Ok(Json(FollowResponse { changed }))
}
