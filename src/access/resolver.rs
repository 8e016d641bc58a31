//! Effective role of a profile on a board, including roles inherited
//! through the parent chain.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::boards::{ancestors, Board, BoardRepository, ProfileId, Role};
use crate::cache::PermissionCache;
use crate::error::AuthResult;
use crate::telemetry::metrics::record_role_resolution;

pub const DEFAULT_MAX_DEPTH: usize = 32;

pub struct RoleResolver {
    boards: Arc<dyn BoardRepository>,
    cache: PermissionCache,
    max_depth: usize,
}

impl RoleResolver {
    pub fn new(boards: Arc<dyn BoardRepository>, cache: PermissionCache, max_depth: usize) -> Self {
        Self {
            boards,
            cache,
            max_depth,
        }
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Computes the role without touching the cache.
    ///
    /// Walks from the root ancestor down to `board`. On each board a direct
    /// role wins; otherwise the parent's role carries over, with `owner`
    /// demoted to `admin`.
    pub async fn compute_role(&self, board: &Board, profile: ProfileId) -> AuthResult<Role> {
        let chain = ancestors(self.boards.as_ref(), board, self.max_depth).await?;

        let role = chain
            .iter()
            .rev()
            .chain(std::iter::once(board))
            .fold(Role::None, |parent_role, b| match b.direct_role(profile) {
                Role::None => parent_role.inherited(),
                direct => direct,
            });

        Ok(role)
    }

    /// Resolves the role, merges it into the profile's cache entry under
    /// `cache_key` and returns the stored (internal) role.
    #[instrument(skip(self, board), fields(board_id = %board.id, profile = %profile))]
    pub async fn resolve_internal(
        &self,
        cache_key: &str,
        board: &Board,
        profile: ProfileId,
    ) -> AuthResult<Role> {
        let role = self.compute_role(board, profile).await?;

        self.cache
            .update(cache_key, |permissions| permissions.insert(board.id, role))
            .await?;

        record_role_resolution(role);
        debug!(role = %role, "Resolved board role");
        Ok(role)
    }

    /// Same as [`resolve_internal`](Self::resolve_internal) with `guest`
    /// reported as `viewer`.
    pub async fn resolve_role(
        &self,
        cache_key: &str,
        board: &Board,
        profile: ProfileId,
    ) -> AuthResult<Role> {
        Ok(self
            .resolve_internal(cache_key, board, profile)
            .await?
            .external())
    }
}
