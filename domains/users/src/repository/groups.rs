//! Group repository

use async_trait::async_trait;
use roster_common::ConnectionScope;
use uuid::Uuid;

use super::{GroupRepository, RepositoryResult};
use crate::domain::entities::Group;

#[derive(Clone)]
pub struct PgGroupRepository {
    scope: ConnectionScope,
}

impl PgGroupRepository {
    pub fn new(scope: impl Into<ConnectionScope>) -> Self {
        Self {
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn create(&self, group: &Group) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        sqlx::query(r#"INSERT INTO "group" (id, name) VALUES ($1, $2)"#)
            .bind(group.id)
            .bind(&group.name)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn list(&self) -> RepositoryResult<Vec<Group>> {
        let mut conn = self.scope.acquire().await?;
        let groups = sqlx::query_as::<_, Group>(r#"SELECT id, name FROM "group" ORDER BY id ASC"#)
            .fetch_all(&mut *conn)
            .await?;

        Ok(groups)
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Group>> {
        let mut conn = self.scope.acquire().await?;
        let group = sqlx::query_as::<_, Group>(r#"SELECT id, name FROM "group" WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(group)
    }

    async fn update(&self, group: &Group) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        sqlx::query(r#"UPDATE "group" SET name = $2 WHERE id = $1"#)
            .bind(group.id)
            .bind(&group.name)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<()> {
        let mut conn = self.scope.acquire().await?;
        sqlx::query(r#"DELETE FROM "group" WHERE id = $1"#)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn groups_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Group>> {
        let mut conn = self.scope.acquire().await?;
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name
            FROM "group" g
            INNER JOIN user_groups ug ON g.id = ug.group_id
            WHERE ug.user_id = $1
            ORDER BY g.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(groups)
    }
}
