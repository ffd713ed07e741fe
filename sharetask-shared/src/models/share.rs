/// Task share relation
///
/// One row per (task, sharee) pair. The composite primary key makes a pair
/// unique, and both foreign keys cascade: deleting the task or the sharee
/// removes the row.
///
/// ```sql
/// CREATE TABLE task_shares (
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     PRIMARY KEY (task_id, user_id)
/// );
/// ```

use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};
use std::collections::HashMap;
use uuid::Uuid;

use super::user::PublicUser;

/// A sharee's public profile tagged with the task it was fetched for
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SharedUser {
    pub task_id: Uuid,
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<SharedUser> for PublicUser {
    fn from(row: SharedUser) -> Self {
        PublicUser {
            id: row.id,
            username: row.username,
            email: row.email,
        }
    }
}

pub struct TaskShare;

impl TaskShare {
    /// Replaces the whole share set of a task
    ///
    /// `user_ids` must already be normalized (owner removed, deduplicated)
    /// and known to exist.
    pub async fn replace(
        conn: &mut PgConnection,
        task_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_shares WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;

        if !user_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO task_shares (task_id, user_id)
                SELECT $1, UNNEST($2::uuid[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(task_id)
            .bind(user_ids)
            .execute(&mut *conn)
            .await?;
        }

        tracing::debug!(%task_id, sharees = user_ids.len(), "Task shares replaced");

        Ok(())
    }

    /// Ids of the users a task is shared with
    pub async fn user_ids<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM task_shares WHERE task_id = $1 ORDER BY user_id",
        )
        .bind(task_id)
        .fetch_all(executor)
        .await?;

        Ok(ids)
    }

    /// Public profiles of the sharees of each task, grouped by task id
    ///
    /// One query for a whole page of tasks. Tasks without sharees are absent
    /// from the map.
    pub async fn users_for_tasks<'e, E>(
        executor: E,
        task_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<PublicUser>>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, SharedUser>(
            r#"
            SELECT s.task_id, u.id, u.username, u.email
            FROM task_shares s
            JOIN users u ON u.id = s.user_id
            WHERE s.task_id = ANY($1)
            ORDER BY u.username ASC
            "#,
        )
        .bind(task_ids)
        .fetch_all(executor)
        .await?;

        Ok(group_by_task(rows))
    }
}

fn group_by_task(rows: Vec<SharedUser>) -> HashMap<Uuid, Vec<PublicUser>> {
    let mut grouped: HashMap<Uuid, Vec<PublicUser>> = HashMap::new();

    for row in rows {
        grouped.entry(row.task_id).or_default().push(row.into());
    }

    grouped
}
