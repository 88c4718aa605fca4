use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserPatch};

/// Fields guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UniqueField::Username => "username",
            UniqueField::Email => "email",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would have broken a uniqueness constraint.
    #[error("duplicate {0}")]
    Duplicate(UniqueField),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence for user records.
///
/// Implementations must enforce username/email uniqueness atomically with the
/// write itself and report clashes as [`StoreError::Duplicate`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_field(&self, field: UniqueField, value: &str)
        -> Result<Option<User>, StoreError>;

    async fn insert_unique(&self, user: NewUser) -> Result<User, StoreError>;

    /// Returns `None` when no record has this id.
    async fn update_merge(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError>;

    /// Returns `false` when no record has this id.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Case-insensitive literal substring match on username or email.
    async fn search(&self, query: &str) -> Result<Vec<User>, StoreError>;
}
