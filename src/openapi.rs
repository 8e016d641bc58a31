//! OpenAPI document and Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::boards::Role;
use crate::error::ApiError;
use crate::grpc::people::AccountDetails;
use crate::handlers::{auth, boards, health, members};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sidekiq Auth API",
        version = "1.0.0",
        description = "Session tokens and board access control.\n\n\
        ## Authentication\n\
        `POST /auth` returns a token and sets the `rs-sidkiq-auth-token` cookie.\n\
        Protected endpoints accept the token as an `rs-sidkiq-auth-token` header, \
        an `Authorization: Bearer` header or the cookie, together with a `Profile` \
        header naming the acting profile.\n\n\
        ## Roles\n\
        owner, admin, author, subscriber, viewer, blocked. Guests are reported as viewers. \
        A role on a parent board carries over to its children, with owner reduced to admin."
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Login and session"),
        (name = "Boards", description = "Board lifecycle, roles and permission checks"),
        (name = "Members", description = "Membership changes on a board")
    ),
    paths(
        health::health_check_simple,
        health::health_check,
        health::ready_check,
        health::live_check,

        auth::login,
        auth::get_current_user,

        boards::get_board_role,
        boards::check_board_permission,
        boards::create_board,
        boards::delete_board,

        members::add_member,
        members::change_member_role,
        members::remove_member,
        members::block_profiles,
        members::unblock_profiles,
        members::follow_board,
        members::unfollow_board,
    ),
    components(
        schemas(
            ApiError,
            Role,
            AccountDetails,
            auth::LoginRequest,
            auth::LoginData,
            auth::LoginResponse,
            auth::CurrentUserResponse,
            boards::BoardRoleResponse,
            boards::PermissionCheckRequest,
            boards::PermissionCheckResponse,
            boards::CreateBoardRequest,
            boards::CreateBoardResponse,
            members::AddMemberRequest,
            members::ChangeRoleRequest,
            members::ProfilesRequest,
            members::MemberResponse,
            members::UnblockResponse,
            members::FollowResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session token from POST /auth"))
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
