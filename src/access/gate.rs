//! Role-set guard used before board mutations.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use super::RoleResolver;
use crate::boards::{Board, BoardId, BoardRepository, ProfileId, Role};
use crate::cache::PermissionCache;
use crate::error::{AuthResult, AuthorizationError};
use crate::telemetry::metrics::record_permission_check;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    /// Internal role the decision was based on.
    pub role: Role,
}

pub struct AccessGate {
    boards: Arc<dyn BoardRepository>,
    resolver: Arc<RoleResolver>,
}

/// Role sets are written in external terms, so a guest matches `viewer`
/// and nothing matches `guest`.
fn role_matches(role: Role, roles: &[Role]) -> bool {
    roles.contains(&role.external())
}

impl AccessGate {
    pub fn new(boards: Arc<dyn BoardRepository>, resolver: Arc<RoleResolver>) -> Self {
        Self { boards, resolver }
    }

    pub async fn load_board(&self, board_id: BoardId) -> AuthResult<Board> {
        self.boards
            .find_by_id(board_id)
            .await?
            .ok_or_else(|| AuthorizationError::BoardNotFound(board_id.to_hex()).into())
    }

    /// With `disallow`, the profile passes when its role is outside `roles`;
    /// otherwise it passes when its role is one of `roles`.
    #[instrument(skip(self, roles), fields(board_id = %board_id, profile = %profile))]
    pub async fn decide(
        &self,
        profile: ProfileId,
        board_id: BoardId,
        roles: &[Role],
        disallow: bool,
    ) -> AuthResult<AccessDecision> {
        let started = Instant::now();
        let board = self.load_board(board_id).await?;
        let role = self
            .resolver
            .resolve_internal(&PermissionCache::key_for(profile), &board, profile)
            .await?;

        let allowed = role_matches(role, roles) != disallow;

        record_permission_check(allowed, started.elapsed());
        debug!(role = %role, allowed, disallow, "Permission check");
        Ok(AccessDecision { allowed, role })
    }

    pub async fn check_valid_permissions(
        &self,
        profile: ProfileId,
        board_id: BoardId,
        roles: &[Role],
        disallow: bool,
    ) -> AuthResult<bool> {
        Ok(self.decide(profile, board_id, roles, disallow).await?.allowed)
    }

    /// Like [`decide`](Self::decide) but a denial becomes `RoleNotPermitted`.
    pub async fn require(
        &self,
        profile: ProfileId,
        board_id: BoardId,
        roles: &[Role],
        disallow: bool,
    ) -> AuthResult<Role> {
        let decision = self.decide(profile, board_id, roles, disallow).await?;
        if decision.allowed {
            Ok(decision.role)
        } else {
            Err(AuthorizationError::RoleNotPermitted.into())
        }
    }
}
