//! Board hierarchy: documents, roles and storage.

pub mod model;
pub mod repository;

pub use model::{Board, BoardId, ProfileId, Role, Visibility};
pub use repository::{ancestors, BoardArena, BoardRepository, RepositoryError};
