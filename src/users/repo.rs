use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::ApiError,
    users::{
        model::{NewUser, User},
        repo_types::UserRow,
        validation::duplicate_email,
    },
};

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("email already in use")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A storage-level duplicate surfaces as the same `email` violation the
/// validation pipeline reports.
impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::DuplicateEmail => duplicate_email(),
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Other(e) => ApiError::Internal(e),
        }
    }
}

/// Persistence for user records. Implementations assign ids on insert and
/// must reject a second record with the same email.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn insert(&self, new: NewUser) -> Result<User, RepoError>;
    async fn update(&self, user: &User) -> Result<User, RepoError>;
    /// Returns false when nothing was deleted.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(e: sqlx::Error, what: &'static str) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::DuplicateEmail,
        _ => RepoError::Other(anyhow::Error::new(e).context(what)),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password, roles
            FROM "user"
            ORDER BY email
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password, roles
            FROM "user"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password, roles
            FROM "user"
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::from))
    }

    async fn insert(&self, new: NewUser) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO "user" (id, email, password, roles)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password, roles
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(Json(&new.roles))
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert user"))?;
        Ok(row.into())
    }

    async fn update(&self, user: &User) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE "user"
               SET email = $2, password = $3, roles = $4
             WHERE id = $1
            RETURNING id, email, password, roles
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Json(user.stored_roles()))
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "update user"))?;
        row.map(User::from).ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}

/// Process-local store. Uniqueness check and write happen under one lock.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let mut all: Vec<User> = self.users.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(all)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let user = User::new(Uuid::new_v4(), new.email, new.password_hash, new.roles);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(RepoError::NotFound);
        }
        if users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(RepoError::DuplicateEmail);
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            roles: vec!["EDITOR".into()],
        }
    }

    #[test]
    fn repo_errors_map_onto_api_errors() {
        match ApiError::from(RepoError::DuplicateEmail) {
            ApiError::ValidationFailed(v) => assert_eq!(v[0].field, "email"),
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(matches!(ApiError::from(RepoError::NotFound), ApiError::NotFound));
        assert!(matches!(
            ApiError::from(RepoError::Other(anyhow::anyhow!("db down"))),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn insert_assigns_id_and_keeps_fields() {
        let repo = InMemoryUserRepository::default();
        let user = repo.insert(new_user("a@x.com")).await.unwrap();
        assert!(!user.id.is_nil());
        assert_eq!(user.stored_roles(), ["EDITOR"]);

        let found = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found, user);
        assert_eq!(repo.find_by_email("a@x.com").await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_on_insert_and_update() {
        let repo = InMemoryUserRepository::default();
        repo.insert(new_user("a@x.com")).await.unwrap();
        let mut b = repo.insert(new_user("b@x.com")).await.unwrap();

        assert!(matches!(
            repo.insert(new_user("a@x.com")).await,
            Err(RepoError::DuplicateEmail)
        ));

        b.email = "a@x.com".into();
        assert!(matches!(repo.update(&b).await, Err(RepoError::DuplicateEmail)));
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_inserts_with_same_email_store_one_record() {
        let repo = std::sync::Arc::new(InMemoryUserRepository::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.insert(new_user("race@x.com")).await }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_missing_record() {
        let repo = InMemoryUserRepository::default();
        let ghost = User::new(Uuid::new_v4(), "g@x.com".into(), "h".into(), vec![]);
        assert!(matches!(repo.update(&ghost).await, Err(RepoError::NotFound)));
        assert!(!repo.delete(ghost.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_is_sorted_by_email() {
        let repo = InMemoryUserRepository::default();
        repo.insert(new_user("c@x.com")).await.unwrap();
        repo.insert(new_user("a@x.com")).await.unwrap();
        let emails: Vec<_> = repo.list().await.unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["a@x.com", "c@x.com"]);
    }
}
