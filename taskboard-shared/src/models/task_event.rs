/// Task Event model and database operations
///
/// This module provides the TaskEvent model for Taskboard's append-only
/// change log. Every successful task creation, field-level update, and
/// dependency addition appends one row; failed operations append nothing
/// because events are written inside the mutating transaction. Rows are
/// never updated or deleted (task hard-delete cascades excepted).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_events (
///     id BIGSERIAL PRIMARY KEY,
///     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
///     user_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     event_type VARCHAR(50) NOT NULL,
///     field VARCHAR(50),
///     old_value TEXT,
///     new_value TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::task_event::TaskEvent;
/// use chrono::{Duration, Utc};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// // Events on the user's tasks from the last week, newest first
/// let since = Utc::now() - Duration::days(7);
/// let feed = TaskEvent::timeline(&pool, user_id, since).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Event types in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Task was created
    Created,

    /// One task field changed value
    Updated,

    /// A depends-on edge was added to the task
    DependencyAdded,
}

impl EventType {
    /// Converts type to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::Updated => "updated",
            EventType::DependencyAdded => "dependency_added",
        }
    }

    /// Parses type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(EventType::Created),
            "updated" => Some(EventType::Updated),
            "dependency_added" => Some(EventType::DependencyAdded),
            _ => None,
        }
    }
}

/// TaskEvent model, one row in the append-only change log
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskEvent {
    /// Monotonic event ID
    pub id: i64,

    /// Task this event belongs to
    pub task_id: Uuid,

    /// Acting user (nullable if the user was deleted)
    pub user_id: Option<Uuid>,

    /// Event type string ("created", "updated", "dependency_added")
    pub event_type: String,

    /// Changed field name for `updated` events, "depends_on" for
    /// `dependency_added`, NULL for `created`
    pub field: Option<String>,

    /// Stringified previous value, if any
    pub old_value: Option<String>,

    /// Stringified new value, if any
    pub new_value: Option<String>,

    /// When the event was recorded
    pub created_at: DateTime<Utc>,
}

/// Input for appending an event
#[derive(Debug, Clone)]
pub struct AppendEvent {
    pub task_id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: EventType,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl TaskEvent {
    /// Appends one event inside the caller's transaction
    ///
    /// Callers must pass the transaction of the mutation the event records
    /// so both commit or roll back together.
    pub async fn append(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        data: AppendEvent,
    ) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, TaskEvent>(
            r#"
            INSERT INTO task_events (task_id, user_id, event_type, field, old_value, new_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, task_id, user_id, event_type, field, old_value, new_value, created_at
            "#,
        )
        .bind(data.task_id)
        .bind(data.user_id)
        .bind(data.event_type.as_str())
        .bind(data.field)
        .bind(data.old_value)
        .bind(data.new_value)
        .fetch_one(&mut **tx)
        .await?;

        Ok(event)
    }

    /// Lists all events for a task in append order
    pub async fn list_for_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, TaskEvent>(
            r#"
            SELECT id, task_id, user_id, event_type, field, old_value, new_value, created_at
            FROM task_events
            WHERE task_id = $1
            ORDER BY id
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }

    /// Returns the user-scoped event feed: events on tasks the user created
    /// or is assigned to, recorded at or after `since`, newest first
    ///
    /// `id DESC` breaks timestamp ties so the order is deterministic.
    pub async fn timeline(
        pool: &PgPool,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, TaskEvent>(
            r#"
            SELECT e.id, e.task_id, e.user_id, e.event_type, e.field,
                   e.old_value, e.new_value, e.created_at
            FROM task_events e
            JOIN tasks t ON t.id = e.task_id
            WHERE e.created_at >= $2
              AND (t.created_by = $1 OR t.assignee_id = $1)
            ORDER BY e.created_at DESC, e.id DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_as_str() {
        assert_eq!(EventType::Created.as_str(), "created");
        assert_eq!(EventType::Updated.as_str(), "updated");
        assert_eq!(EventType::DependencyAdded.as_str(), "dependency_added");
    }

    #[test]
    fn test_event_type_roundtrip() {
        for kind in [
            EventType::Created,
            EventType::Updated,
            EventType::DependencyAdded,
        ] {
            assert_eq!(EventType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventType::parse("deleted"), None);
    }
}
