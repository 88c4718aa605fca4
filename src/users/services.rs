use std::sync::Arc;

use axum::extract::FromRef;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    repo::{UniqueField, UserStore},
    repo_types::{NewUser, PublicUser},
    validation::{patch_from_fields, Credentials, Registration},
};
use crate::{
    auth::{JwtKeys, PasswordHasher, Principal},
    error::AppError,
    state::AppState,
};

/// Account operations on top of a [`UserStore`].
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    keys: JwtKeys,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        state.accounts.clone()
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self {
            store,
            hasher,
            keys,
        }
    }

    /// Creates the account and returns its id. No token is issued here.
    ///
    /// The lookups only pick the error message (email before username); the
    /// insert itself is what enforces uniqueness under concurrency.
    pub async fn register(&self, reg: Registration) -> Result<Uuid, AppError> {
        for (field, value) in [
            (UniqueField::Email, &reg.email),
            (UniqueField::Username, &reg.username),
        ] {
            if self.store.find_by_field(field, value).await?.is_some() {
                warn!(%field, "registration conflict");
                return Err(AppError::Conflict(field));
            }
        }

        let password_hash = self.hasher.hash_blocking(reg.password).await?;

        let user = self
            .store
            .insert_unique(NewUser {
                id: Uuid::new_v4(),
                username: reg.username,
                email: reg.email,
                password_hash,
                full_name: reg.full_name,
                gender: reg.gender,
                date_of_birth: reg.date_of_birth,
                country: reg.country,
            })
            .await
            .inspect_err(|e| warn!(error = %e, "insert user failed"))?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user.id)
    }

    /// Unknown username and wrong password are reported identically.
    pub async fn login(&self, creds: Credentials) -> Result<String, AppError> {
        let Some(user) = self
            .store
            .find_by_field(UniqueField::Username, &creds.username)
            .await?
        else {
            warn!("login unknown username");
            return Err(AppError::InvalidCredentials);
        };

        let ok = self
            .hasher
            .verify_blocking(creds.password, user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id, &user.username)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    pub async fn search(&self, query: Option<&str>) -> Result<Vec<PublicUser>, AppError> {
        let query = query
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::BadRequest("Search query is required".into()))?;
        let users = self.store.search(query).await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    pub async fn profile(&self, who: &Principal) -> Result<PublicUser, AppError> {
        self.store
            .find_by_id(who.user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(AppError::NotFound)
    }

    /// Merges the supplied fields into the caller's record. A `password` key is
    /// silently discarded.
    pub async fn update(
        &self,
        who: &Principal,
        fields: Map<String, Value>,
    ) -> Result<PublicUser, AppError> {
        let patch = patch_from_fields(fields)?;
        let user = self
            .store
            .update_merge(who.user_id, patch)
            .await?
            .ok_or(AppError::NotFound)?;
        info!(user_id = %user.id, "user updated");
        Ok(user.into())
    }

    pub async fn delete(&self, who: &Principal) -> Result<(), AppError> {
        if !self.store.delete_by_id(who.user_id).await? {
            return Err(AppError::NotFound);
        }
        info!(user_id = %who.user_id, "user deleted");
        Ok(())
    }
}
