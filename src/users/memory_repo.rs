use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{StoreError, UniqueField, UserStore},
    repo_types::{NewUser, User, UserPatch},
};

/// In-process store. Uniqueness checks and the write share one lock, so the
/// constraint holds under concurrent registrations just like a database index.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clash(
    users: &HashMap<Uuid, User>,
    skip: Option<Uuid>,
    email: Option<&str>,
    username: Option<&str>,
) -> Option<UniqueField> {
    let others = || users.values().filter(move |u| Some(u.id) != skip);
    if let Some(email) = email {
        if others().any(|u| u.email == email) {
            return Some(UniqueField::Email);
        }
    }
    if let Some(username) = username {
        if others().any(|u| u.username == username) {
            return Some(UniqueField::Username);
        }
    }
    None
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_field(
        &self,
        field: UniqueField,
        value: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| match field {
                UniqueField::Username => u.username == value,
                UniqueField::Email => u.email == value,
            })
            .cloned())
    }

    async fn insert_unique(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if let Some(field) = clash(&users, None, Some(new.email.as_str()), Some(new.username.as_str())) {
            return Err(StoreError::Duplicate(field));
        }
        if users.contains_key(&new.id) {
            return Err(anyhow::anyhow!("user id {} already present", new.id).into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: new.id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            gender: new.gender,
            date_of_birth: new.date_of_birth,
            country: new.country,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_merge(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&id) {
            return Ok(None);
        }
        if let Some(field) = clash(
            &users,
            Some(id),
            patch.email.as_deref(),
            patch.username.as_deref(),
        ) {
            return Err(StoreError::Duplicate(field));
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(user);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn search(&self, query: &str) -> Result<Vec<User>, StoreError> {
        let needle = query.to_lowercase();
        let users = self.users.read().await;
        let mut found: Vec<User> = users
            .values()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by_key(|u| u.created_at);
        Ok(found)
    }
}
