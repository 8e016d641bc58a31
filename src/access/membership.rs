//! Membership transitions on a board.
//!
//! Every transition persists the board first and then rewrites the affected
//! profiles' cache entries, so a later permission check sees the new role.
//! `blocked` is terminal: it only leaves through [`MembershipService::unblock`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument};

use super::{AccessGate, RoleResolver};
use crate::boards::{Board, BoardId, BoardRepository, ProfileId, Role};
use crate::cache::PermissionCache;
use crate::error::{AuthResult, AuthorizationError};

const MANAGERS: &[Role] = &[Role::Owner, Role::Admin];

fn conflict(message: impl Into<String>) -> AuthorizationError {
    AuthorizationError::MembershipConflict(message.into())
}

/// One mutex per board. Writes load, edit and save the whole document, so
/// two writers on the same board must not interleave.
#[derive(Default)]
struct BoardLocks(DashMap<BoardId, Arc<Mutex<()>>>);

impl BoardLocks {
    async fn acquire(&self, board_id: BoardId) -> OwnedMutexGuard<()> {
        let lock = self.0.entry(board_id).or_default().clone();
        lock.lock_owned().await
    }
}

pub struct MembershipService {
    boards: Arc<dyn BoardRepository>,
    cache: PermissionCache,
    gate: Arc<AccessGate>,
    resolver: Arc<RoleResolver>,
    locks: BoardLocks,
}

impl MembershipService {
    pub fn new(
        boards: Arc<dyn BoardRepository>,
        cache: PermissionCache,
        gate: Arc<AccessGate>,
        resolver: Arc<RoleResolver>,
    ) -> Self {
        Self {
            boards,
            cache,
            gate,
            resolver,
            locks: BoardLocks::default(),
        }
    }

    async fn managed_board(&self, actor: ProfileId, board_id: BoardId) -> AuthResult<Board> {
        self.gate.require(actor, board_id, MANAGERS, false).await?;
        self.gate.load_board(board_id).await
    }

    /// Joins `profile` to the board with the invited role.
    #[instrument(skip(self), fields(board_id = %board_id, profile = %profile, role = %role))]
    pub async fn accept_invite(
        &self,
        board_id: BoardId,
        profile: ProfileId,
        role: Role,
    ) -> AuthResult<Role> {
        if matches!(role, Role::Owner | Role::Blocked | Role::None) {
            return Err(conflict(format!("cannot invite as {role}")).into());
        }

        let _guard = self.locks.acquire(board_id).await;
        let mut board = self.gate.load_board(board_id).await?;
        match board.direct_role(profile) {
            Role::None => {}
            Role::Blocked => return Err(conflict("profile is blocked on this board").into()),
            _ => return Err(conflict("profile is already a member").into()),
        }

        board.add_member(profile, role);
        self.boards.save(board).await?;
        self.cache.set_role(profile, board_id, role).await?;

        info!("Invite accepted");
        Ok(role.external())
    }

    /// Adds the follower flag. Blocked profiles cannot follow.
    pub async fn follow(&self, board_id: BoardId, profile: ProfileId) -> AuthResult<bool> {
        let _guard = self.locks.acquire(board_id).await;
        let mut board = self.gate.load_board(board_id).await?;
        let role = self
            .resolver
            .resolve_internal(&PermissionCache::key_for(profile), &board, profile)
            .await?;
        if role == Role::Blocked {
            return Err(AuthorizationError::RoleNotPermitted.into());
        }
        if board.is_follower(profile) {
            return Ok(false);
        }

        board.followers.push(profile);
        self.boards.save(board).await?;
        info!(board_id = %board_id, profile = %profile, "Board followed");
        Ok(true)
    }

    pub async fn unfollow(&self, board_id: BoardId, profile: ProfileId) -> AuthResult<bool> {
        let _guard = self.locks.acquire(board_id).await;
        let mut board = self.gate.load_board(board_id).await?;
        if !board.is_follower(profile) {
            return Ok(false);
        }

        board.followers.retain(|p| *p != profile);
        self.boards.save(board).await?;
        info!(board_id = %board_id, profile = %profile, "Board unfollowed");
        Ok(true)
    }

    #[instrument(skip(self, targets), fields(board_id = %board_id, actor = %actor, count = targets.len()))]
    pub async fn block(
        &self,
        actor: ProfileId,
        board_id: BoardId,
        targets: &[ProfileId],
    ) -> AuthResult<()> {
        let _guard = self.locks.acquire(board_id).await;
        let mut board = self.managed_board(actor, board_id).await?;
        if targets.contains(&board.owner) {
            return Err(conflict("the owner cannot be blocked").into());
        }

        for target in targets {
            board.add_member(*target, Role::Blocked);
            board.followers.retain(|p| p != target);
        }
        self.boards.save(board).await?;

        for target in targets {
            self.cache.set_role(*target, board_id, Role::Blocked).await?;
        }
        info!("Profiles blocked");
        Ok(())
    }

    /// Lifts a block. The profile ends with no role and must be re-granted.
    /// Targets that are not blocked are left alone.
    #[instrument(skip(self, targets), fields(board_id = %board_id, actor = %actor, count = targets.len()))]
    pub async fn unblock(
        &self,
        actor: ProfileId,
        board_id: BoardId,
        targets: &[ProfileId],
    ) -> AuthResult<Vec<ProfileId>> {
        let _guard = self.locks.acquire(board_id).await;
        let mut board = self.managed_board(actor, board_id).await?;

        let unblocked: Vec<ProfileId> = targets
            .iter()
            .copied()
            .filter(|t| board.direct_role(*t) == Role::Blocked)
            .collect();
        if unblocked.is_empty() {
            return Ok(unblocked);
        }

        for target in &unblocked {
            board.remove_member(*target);
        }
        self.boards.save(board).await?;

        for target in &unblocked {
            self.cache.remove_board(*target, board_id).await?;
        }
        info!(unblocked = unblocked.len(), "Profiles unblocked");
        Ok(unblocked)
    }

    #[instrument(skip(self), fields(board_id = %board_id, actor = %actor, target = %target, role = %new_role))]
    pub async fn change_role(
        &self,
        actor: ProfileId,
        board_id: BoardId,
        target: ProfileId,
        new_role: Role,
    ) -> AuthResult<Role> {
        if matches!(new_role, Role::Owner | Role::Blocked | Role::None) {
            return Err(conflict(format!("cannot change role to {new_role}")).into());
        }

        let _guard = self.locks.acquire(board_id).await;
        let mut board = self.managed_board(actor, board_id).await?;
        match board.direct_role(target) {
            Role::Owner => return Err(conflict("the owner cannot be reassigned").into()),
            Role::Blocked => return Err(conflict("profile is blocked, unblock first").into()),
            Role::None => return Err(conflict("profile is not a member").into()),
            _ => {}
        }

        board.add_member(target, new_role);
        self.boards.save(board).await?;
        self.cache.set_role(target, board_id, new_role).await?;

        info!("Role changed");
        Ok(new_role.external())
    }

    #[instrument(skip(self, targets), fields(board_id = %board_id, actor = %actor, count = targets.len()))]
    pub async fn remove(
        &self,
        actor: ProfileId,
        board_id: BoardId,
        targets: &[ProfileId],
    ) -> AuthResult<()> {
        let _guard = self.locks.acquire(board_id).await;
        let mut board = self.managed_board(actor, board_id).await?;
        if targets.contains(&board.owner) {
            return Err(conflict("the owner cannot be removed").into());
        }

        for target in targets {
            board.remove_member(*target);
            board.followers.retain(|p| p != target);
        }
        self.boards.save(board).await?;

        for target in targets {
            self.cache.remove_board(*target, board_id).await?;
        }
        info!("Members removed");
        Ok(())
    }
}
