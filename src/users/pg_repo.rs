use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    repo::{StoreError, UniqueField, UserStore},
    repo_types::{NewUser, User, UserPatch},
};

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, gender, \
                            date_of_birth, country, created_at, updated_at";

/// Postgres-backed store. Uniqueness comes from the `users_username_key` and
/// `users_email_key` constraints created by the migrations.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Maps a unique-constraint violation to the field it protects.
pub(crate) fn duplicate_field(err: &sqlx::Error) -> Option<UniqueField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }
    match db_err.constraint() {
        Some(c) if c.contains("email") => Some(UniqueField::Email),
        Some(c) if c.contains("username") => Some(UniqueField::Username),
        _ => None,
    }
}

fn write_error(err: sqlx::Error, what: &'static str) -> StoreError {
    match duplicate_field(&err) {
        Some(field) => StoreError::Duplicate(field),
        None => StoreError::Backend(anyhow::Error::new(err).context(what)),
    }
}

/// Escapes LIKE wildcards so the query matches as a literal substring.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_field(
        &self,
        field: UniqueField,
        value: &str,
    ) -> Result<Option<User>, StoreError> {
        let column = match field {
            UniqueField::Username => "username",
            UniqueField::Email => "email",
        };
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }

    async fn insert_unique(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, gender, date_of_birth, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(new.gender)
        .bind(new.date_of_birth)
        .bind(&new.country)
        .fetch_one(&self.db)
        .await
        .map_err(|e| write_error(e, "insert user"))
    }

    async fn update_merge(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                username      = COALESCE($2, username),
                email         = COALESCE($3, email),
                full_name     = COALESCE($4, full_name),
                gender        = COALESCE($5, gender),
                date_of_birth = COALESCE($6, date_of_birth),
                country       = COALESCE($7, country),
                updated_at    = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.username)
        .bind(patch.email)
        .bind(patch.full_name)
        .bind(patch.gender)
        .bind(patch.date_of_birth)
        .bind(patch.country)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| write_error(e, "update user"))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn search(&self, query: &str) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE username ILIKE $1 ESCAPE '\'
                OR email    ILIKE $1 ESCAPE '\'
             ORDER BY created_at ASC
            "#
        ))
        .bind(like_pattern(query))
        .fetch_all(&self.db)
        .await
        .context("search users")?;
        Ok(rows)
    }
}
