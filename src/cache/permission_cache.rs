//! Per-profile board permission maps stored under `boards:<profileID>`.
//!
//! The stored value is a JSON object of board id (hex) to role name. Reads
//! are lossy: an absent or unreadable entry is an empty map, and entries
//! with an unknown board id or role are skipped. Writes merge through
//! compare-and-swap so updates for different boards never overwrite each
//! other.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CacheError, KvStore};
use crate::boards::{BoardId, ProfileId, Role};
use crate::telemetry::metrics::record_cache_retry;

const BOARDS_KEY_PREFIX: &str = "boards:";
const DEFAULT_MAX_RETRIES: u32 = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardPermissions(BTreeMap<BoardId, Role>);

impl BoardPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Self {
        let Ok(entries) = serde_json::from_str::<BTreeMap<String, serde_json::Value>>(raw) else {
            warn!("Unreadable permission cache entry, treating as empty");
            return Self::default();
        };

        let map = entries
            .into_iter()
            .filter_map(|(board, role)| {
                let board = board.parse::<BoardId>().ok()?;
                let role = role.as_str()?.parse::<Role>().ok()?;
                (role != Role::None).then_some((board, role))
            })
            .collect();
        Self(map)
    }

    pub fn to_json(&self) -> Result<String, CacheError> {
        serde_json::to_string(self).map_err(|_| CacheError::Serialization)
    }

    pub fn get(&self, board: BoardId) -> Option<Role> {
        self.0.get(&board).copied()
    }

    /// Records `role` for `board`. `Role::None` removes the entry instead.
    pub fn insert(&mut self, board: BoardId, role: Role) {
        if role == Role::None {
            self.0.remove(&board);
        } else {
            self.0.insert(board, role);
        }
    }

    pub fn remove(&mut self, board: BoardId) -> Option<Role> {
        self.0.remove(&board)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone)]
pub struct PermissionCache {
    store: Arc<dyn KvStore>,
    max_retries: u32,
}

impl PermissionCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(store: Arc<dyn KvStore>, max_retries: u32) -> Self {
        Self {
            store,
            max_retries: max_retries.max(1),
        }
    }

    pub fn key_for(profile: ProfileId) -> String {
        format!("{BOARDS_KEY_PREFIX}{profile}")
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.store.get(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.store.set(key, value).await
    }

    pub async fn has_entry(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store.get(key).await?.is_some())
    }

    pub async fn get_board_permissions(&self, key: &str) -> Result<BoardPermissions, CacheError> {
        Ok(self
            .store
            .get(key)
            .await?
            .map(|raw| BoardPermissions::from_json(&raw))
            .unwrap_or_default())
    }

    /// Applies `apply` to the current map and writes it back, retrying
    /// from a fresh read whenever the entry changed underneath.
    pub async fn update<F>(&self, key: &str, mut apply: F) -> Result<BoardPermissions, CacheError>
    where
        F: FnMut(&mut BoardPermissions) + Send,
    {
        for attempt in 1..=self.max_retries {
            let current = self.store.get(key).await?;
            let mut permissions = current
                .as_deref()
                .map(BoardPermissions::from_json)
                .unwrap_or_default();
            apply(&mut permissions);
            let next = permissions.to_json()?;

            let unchanged = match current.as_deref() {
                Some(raw) => raw == next,
                None => permissions.is_empty(),
            };
            if unchanged {
                return Ok(permissions);
            }
            if self
                .store
                .compare_and_swap(key, current.as_deref(), &next)
                .await?
            {
                debug!(key = %key, attempt, entries = permissions.len(), "Permission cache updated");
                return Ok(permissions);
            }

            record_cache_retry();
            debug!(key = %key, attempt, "Permission cache entry changed concurrently, retrying");
        }

        warn!(key = %key, attempts = self.max_retries, "Permission cache update gave up");
        Err(CacheError::ContentionExhausted {
            key: key.to_string(),
            attempts: self.max_retries,
        })
    }

    pub async fn set_role(
        &self,
        profile: ProfileId,
        board: BoardId,
        role: Role,
    ) -> Result<BoardPermissions, CacheError> {
        self.update(&Self::key_for(profile), |p| p.insert(board, role))
            .await
    }

    pub async fn remove_board(
        &self,
        profile: ProfileId,
        board: BoardId,
    ) -> Result<BoardPermissions, CacheError> {
        self.update(&Self::key_for(profile), |p| {
            p.remove(board);
        })
        .await
    }
}
