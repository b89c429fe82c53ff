/// Tag model and task-tag associations
///
/// Tags are shared labels with a unique name, attached to tasks through the
/// `task_tags` join table. Tags are created on demand when first referenced
/// by name.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tags (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(50) NOT NULL UNIQUE
/// );
///
/// CREATE TABLE task_tags (
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     tag_id UUID NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
///     PRIMARY KEY (task_id, tag_id)
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Tag model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    /// Unique tag ID
    pub id: Uuid,

    /// Tag name (unique)
    pub name: String,
}

impl Tag {
    /// Fetches a tag by name, creating it if it does not exist
    ///
    /// Upsert via `ON CONFLICT` so concurrent creators converge on one row.
    pub async fn get_or_create(conn: &mut PgConnection, name: &str) -> Result<Self, sqlx::Error> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(name)
        .fetch_one(conn)
        .await?;

        Ok(tag)
    }

    /// Finds a tag by name
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;

        Ok(tag)
    }

    /// Returns the tags attached to a task, ordered by name
    pub async fn for_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT tg.id, tg.name
            FROM task_tags tt
            JOIN tags tg ON tg.id = tt.tag_id
            WHERE tt.task_id = $1
            ORDER BY tg.name
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;

        Ok(tags)
    }
}
