//! User repository

use async_trait::async_trait;
use roster_common::ConnectionScope;
use uuid::Uuid;

use super::{RepositoryResult, UserRepository};
use crate::domain::entities::User;

#[derive(Clone)]
pub struct PgUserRepository {
    scope: ConnectionScope,
}

impl PgUserRepository {
    pub fn new(scope: impl Into<ConnectionScope>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO "user" (id, name, email)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        let mut conn = self.scope.acquire().await?;
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email
            FROM "user"
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(users)
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let mut conn = self.scope.acquire().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email
            FROM "user"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    async fn update(&self, user: &User) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        let result = sqlx::query(
            r#"
            UPDATE "user"
            SET name = $2, email = $3
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(user_id = %user.id, "Update matched no user");
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn add_to_group(&self, user_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO user_groups (user_id, group_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn remove_from_group(&self, user_id: Uuid, group_id: Uuid) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        sqlx::query(
            r#"
            DELETE FROM user_groups
            WHERE user_id = $1 AND group_id = $2
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn users_in_group(&self, group_id: Uuid) -> RepositoryResult<Vec<User>> {
        let mut conn = self.scope.acquire().await?;
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.email
            FROM "user" u
            INNER JOIN user_groups ug ON u.id = ug.user_id
            WHERE ug.group_id = $1
            ORDER BY u.id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(users)
    }

    async fn group_ids_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Uuid>> {
        let mut conn = self.scope.acquire().await?;
        let group_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT group_id
            FROM user_groups
            WHERE user_id = $1
            ORDER BY group_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(group_ids)
    }
}
