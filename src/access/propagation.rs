//! Cache upkeep when boards are created or deleted.
//!
//! Only profiles that already hold a cache entry are touched; anyone else
//! gets their entry lazily on the first permission check. The owner of a
//! new board is the exception and is always written.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::RoleResolver;
use crate::boards::{ancestors, Board, BoardId, BoardRepository, ProfileId, Role};
use crate::cache::PermissionCache;
use crate::error::{AuthResult, AuthorizationError};

pub struct CachePropagator {
    boards: Arc<dyn BoardRepository>,
    cache: PermissionCache,
    resolver: Arc<RoleResolver>,
    max_depth: usize,
}

impl CachePropagator {
    pub fn new(
        boards: Arc<dyn BoardRepository>,
        cache: PermissionCache,
        resolver: Arc<RoleResolver>,
        max_depth: usize,
    ) -> Self {
        Self {
            boards,
            cache,
            resolver,
            max_depth,
        }
    }

    /// Direct members of `board` and every member of its ancestors.
    async fn affected_profiles(&self, board: &Board) -> AuthResult<BTreeSet<ProfileId>> {
        let chain = ancestors(self.boards.as_ref(), board, self.max_depth).await?;
        Ok(std::iter::once(board)
            .chain(chain.iter())
            .flat_map(|b| b.members().into_iter().map(|(p, _)| p))
            .collect())
    }

    /// Persists a new board and writes the roles it grants into existing
    /// cache entries, inherited roles included.
    #[instrument(skip(self, board), fields(board_id = %board.id, owner = %board.owner))]
    pub async fn on_board_created(&self, board: Board) -> AuthResult<()> {
        self.boards.save(board.clone()).await?;
        self.cache
            .set_role(board.owner, board.id, Role::Owner)
            .await?;

        let mut updated = 0usize;
        for profile in self.affected_profiles(&board).await? {
            if profile == board.owner {
                continue;
            }
            let key = PermissionCache::key_for(profile);
            if !self.cache.has_entry(&key).await? {
                continue;
            }
            let role = self.resolver.compute_role(&board, profile).await?;
            self.cache
                .update(&key, |permissions| permissions.insert(board.id, role))
                .await?;
            updated += 1;
        }

        debug!(updated, "Propagated new board into permission cache");
        Ok(())
    }

    /// Deletes the board and drops it from every affected cache entry.
    /// A board that is still some other board's parent is refused.
    #[instrument(skip(self), fields(board_id = %board_id))]
    pub async fn on_board_deleted(&self, board_id: BoardId) -> AuthResult<bool> {
        let Some(board) = self.boards.find_by_id(board_id).await? else {
            return Ok(false);
        };
        let children = self.boards.children_of(board_id).await?;
        if !children.is_empty() {
            warn!(children = children.len(), "Refusing to delete board with child boards");
            return Err(AuthorizationError::BoardHasChildren(board_id.to_hex()).into());
        }
        let affected = self.affected_profiles(&board).await?;
        self.boards.delete(board_id).await?;

        for profile in affected {
            self.cache.remove_board(profile, board_id).await?;
        }

        debug!("Removed deleted board from permission cache");
        Ok(true)
    }
}
