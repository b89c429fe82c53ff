/// Task dependency edges with cycle rejection
///
/// This module records directed depends-on edges between tasks. An edge
/// `task -> depends_on` means the task is blocked on the other task.
/// Insertion rejects self-edges, duplicates, and any edge that would make
/// the dependency graph cyclic.
///
/// # Atomicity
///
/// The cycle check and the insert run inside one `SERIALIZABLE` transaction
/// with both task rows locked (`FOR UPDATE`). Overlapping task sets
/// serialize on the row locks; insertions with disjoint endpoints that
/// would jointly close a cycle fail with a serialization error instead.
/// Transient serialization failures are retried a bounded number of times
/// before surfacing.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_dependencies (
///     id BIGSERIAL PRIMARY KEY,
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     depends_on_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     CONSTRAINT uq_task_depends_on UNIQUE (task_id, depends_on_id),
///     CONSTRAINT chk_no_self_dependency CHECK (task_id <> depends_on_id)
/// );
/// ```

use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::task_event::{AppendEvent, EventType, TaskEvent};
use crate::db::is_transient_error;

/// Retry budget for transient serialization/deadlock failures
const MAX_ATTEMPTS: u32 = 3;

/// Error type for dependency operations
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    /// One of the referenced tasks does not exist
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    /// A task cannot depend on itself
    #[error("Task cannot depend on itself")]
    SelfDependency,

    /// The edge already exists
    #[error("Dependency already exists")]
    Duplicate,

    /// Adding the edge would create a cycle
    #[error("Dependency would create a cycle")]
    Cycle,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A recorded depends-on edge
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskDependency {
    /// Insertion-ordered edge ID
    pub id: i64,

    /// The blocked task
    pub task_id: Uuid,

    /// The task it depends on
    pub depends_on_id: Uuid,
}

impl TaskDependency {
    /// Adds the edge `task_id -> depends_on_id` and appends the
    /// `dependency_added` event, retrying on transient store failures
    ///
    /// # Errors
    ///
    /// - [`DependencyError::SelfDependency`] if both IDs are equal
    /// - [`DependencyError::TaskNotFound`] if either task is missing
    /// - [`DependencyError::Duplicate`] if the edge already exists
    /// - [`DependencyError::Cycle`] if `depends_on_id` can already reach `task_id`
    pub async fn add(
        pool: &PgPool,
        task_id: Uuid,
        depends_on_id: Uuid,
        actor: Uuid,
    ) -> Result<Self, DependencyError> {
        let mut attempt = 1;
        loop {
            match Self::try_add(pool, task_id, depends_on_id, actor).await {
                Err(DependencyError::Database(err))
                    if is_transient_error(&err) && attempt < MAX_ATTEMPTS =>
                {
                    tracing::warn!(
                        %task_id,
                        %depends_on_id,
                        attempt,
                        "Transient failure inserting dependency, retrying"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_add(
        pool: &PgPool,
        task_id: Uuid,
        depends_on_id: Uuid,
        actor: Uuid,
    ) -> Result<Self, DependencyError> {
        if task_id == depends_on_id {
            return Err(DependencyError::SelfDependency);
        }

        let mut tx = pool.begin().await?;

        // Serializable, so two inserts with disjoint endpoints cannot both
        // read a cycle-free graph and commit edges that close one.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // Lock both task rows in a fixed order so concurrent insertions on
        // overlapping task sets serialize rather than deadlock.
        let locked: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM tasks WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(vec![task_id, depends_on_id])
                .fetch_all(&mut *tx)
                .await?;

        let locked_ids: HashSet<Uuid> = locked.into_iter().map(|(id,)| id).collect();
        for id in [task_id, depends_on_id] {
            if !locked_ids.contains(&id) {
                return Err(DependencyError::TaskNotFound(id));
            }
        }

        let duplicate: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM task_dependencies WHERE task_id = $1 AND depends_on_id = $2",
        )
        .bind(task_id)
        .bind(depends_on_id)
        .fetch_optional(&mut *tx)
        .await?;
        if duplicate.is_some() {
            return Err(DependencyError::Duplicate);
        }

        // BFS over the edge set from depends_on_id. If it can already reach
        // task_id, the new edge closes a cycle.
        let mut seen: HashSet<Uuid> = HashSet::from([depends_on_id]);
        let mut frontier = vec![depends_on_id];
        while !frontier.is_empty() {
            let rows: Vec<(Uuid,)> = sqlx::query_as(
                "SELECT depends_on_id FROM task_dependencies WHERE task_id = ANY($1)",
            )
            .bind(frontier)
            .fetch_all(&mut *tx)
            .await?;

            frontier = Vec::new();
            for (next,) in rows {
                if next == task_id {
                    return Err(DependencyError::Cycle);
                }
                if seen.insert(next) {
                    frontier.push(next);
                }
            }
        }

        let edge = sqlx::query_as::<_, TaskDependency>(
            r#"
            INSERT INTO task_dependencies (task_id, depends_on_id)
            VALUES ($1, $2)
            RETURNING id, task_id, depends_on_id
            "#,
        )
        .bind(task_id)
        .bind(depends_on_id)
        .fetch_one(&mut *tx)
        .await?;

        TaskEvent::append(
            &mut tx,
            AppendEvent {
                task_id,
                user_id: Some(actor),
                event_type: EventType::DependencyAdded,
                field: Some("depends_on".to_string()),
                old_value: None,
                new_value: Some(depends_on_id.to_string()),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(%task_id, %depends_on_id, "Dependency added");
        Ok(edge)
    }

    /// Lists the task IDs a task directly depends on, in insertion order
    ///
    /// # Errors
    ///
    /// Returns [`DependencyError::TaskNotFound`] if the task does not exist.
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: Uuid,
    ) -> Result<Vec<Uuid>, DependencyError> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(DependencyError::TaskNotFound(task_id));
        }

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT depends_on_id FROM task_dependencies WHERE task_id = $1 ORDER BY id",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
