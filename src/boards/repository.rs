//! Board storage seam and the in-memory arena implementation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use super::model::{Board, BoardId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("board store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait BoardRepository: Send + Sync {
    async fn find_by_id(&self, id: BoardId) -> Result<Option<Board>, RepositoryError>;

    /// Inserts or replaces the board with the same id.
    async fn save(&self, board: Board) -> Result<(), RepositoryError>;

    async fn delete(&self, id: BoardId) -> Result<Option<Board>, RepositoryError>;

    async fn children_of(&self, id: BoardId) -> Result<Vec<Board>, RepositoryError>;
}

/// Ancestors of `board`, nearest parent first.
///
/// The walk stops at a missing parent, at a board already seen (cyclic
/// `parent_id` chains) or after `max_depth` hops.
pub async fn ancestors(
    repo: &dyn BoardRepository,
    board: &Board,
    max_depth: usize,
) -> Result<Vec<Board>, RepositoryError> {
    let mut chain = Vec::new();
    let mut visited = HashSet::from([board.id]);
    let mut next = board.parent_id;

    while let Some(parent_id) = next {
        if chain.len() >= max_depth {
            warn!(board_id = %board.id, max_depth, "Board hierarchy deeper than limit, truncating");
            break;
        }
        if !visited.insert(parent_id) {
            warn!(board_id = %board.id, parent_id = %parent_id, "Cycle in board hierarchy");
            break;
        }
        let Some(parent) = repo.find_by_id(parent_id).await? else {
            break;
        };
        next = parent.parent_id;
        chain.push(parent);
    }

    Ok(chain)
}

#[derive(Default)]
struct Arena {
    slots: Vec<Option<Board>>,
    index: HashMap<BoardId, usize>,
}

/// Boards held in a slot vector with an id index. Parent links stay ids.
#[derive(Default)]
pub struct BoardArena {
    inner: RwLock<Arena>,
}

impl BoardArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_boards(boards: impl IntoIterator<Item = Board>) -> Self {
        let mut arena = Arena::default();
        for board in boards {
            arena.insert(board);
        }
        Self {
            inner: RwLock::new(arena),
        }
    }

    /// Loads a JSON array of board documents.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let boards: Vec<Board> = serde_json::from_str(raw)?;
        Ok(Self::with_boards(boards))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.index.len()
    }
}

impl Arena {
    fn insert(&mut self, board: Board) {
        match self.index.get(&board.id) {
            Some(&slot) => self.slots[slot] = Some(board),
            None => {
                self.index.insert(board.id, self.slots.len());
                self.slots.push(Some(board));
            }
        }
    }
}

#[async_trait]
impl BoardRepository for BoardArena {
    async fn find_by_id(&self, id: BoardId) -> Result<Option<Board>, RepositoryError> {
        let arena = self.inner.read().await;
        Ok(arena
            .index
            .get(&id)
            .and_then(|&slot| arena.slots[slot].clone()))
    }

    async fn save(&self, board: Board) -> Result<(), RepositoryError> {
        self.inner.write().await.insert(board);
        Ok(())
    }

    async fn delete(&self, id: BoardId) -> Result<Option<Board>, RepositoryError> {
        let mut arena = self.inner.write().await;
        Ok(match arena.index.remove(&id) {
            Some(slot) => arena.slots[slot].take(),
            None => None,
        })
    }

    async fn children_of(&self, id: BoardId) -> Result<Vec<Board>, RepositoryError> {
        let arena = self.inner.read().await;
        Ok(arena
            .slots
            .iter()
            .flatten()
            .filter(|b| b.parent_id == Some(id))
            .cloned()
            .collect())
    }
}
