/// Task model, filter query engine, and field-level change tracking
///
/// This module provides the Task model, the core entity of Taskboard.
/// Mutations run in a single transaction together with their change-log
/// events, so a failed operation never leaves events behind.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status VARCHAR(50) NOT NULL DEFAULT 'todo',
///     priority VARCHAR(50) NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ,
///     created_by UUID NOT NULL REFERENCES users(id),
///     assignee_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     parent_id UUID REFERENCES tasks(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::task::{CreateTask, Task, TaskFilter, TaskStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, me: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let task = Task::create(&pool, CreateTask {
///     title: "Write release notes".to_string(),
///     created_by: me,
///     ..Default::default()
/// })
/// .await?;
///
/// let open = Task::list(&pool, &TaskFilter {
///     statuses: vec![TaskStatus::Todo, TaskStatus::InProgress],
///     ..TaskFilter::default()
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::tag::Tag;
use super::task_event::{AppendEvent, EventType, TaskEvent};

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Being worked on
    InProgress,

    /// Finished
    Done,

    /// Blocked on something outside the dependency graph
    Blocked,
}

impl TaskStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// Parses status from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "blocked" => Some(TaskStatus::Blocked),
            _ => None,
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    /// Converts priority to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    /// Parses priority from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

/// Error type for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Task does not exist
    #[error("Task {0} not found")]
    NotFound(Uuid),

    /// Referenced parent task does not exist
    #[error("Parent task {0} not found")]
    ParentNotFound(Uuid),

    /// The parent link would form a cycle through parent references
    #[error("Parent link would create a cycle")]
    ParentCycle,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Task model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Task title
    pub title: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// Status string ("todo", "in_progress", "done", "blocked")
    pub status: String,

    /// Priority string ("low", "medium", "high")
    pub priority: String,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// User who created the task
    pub created_by: Uuid,

    /// Assigned user, if any
    pub assignee_id: Option<Uuid>,

    /// Parent task for subtasks, if any
    pub parent_id: Option<Uuid>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, \
                            created_by, assignee_id, parent_id, created_at, updated_at";

/// Input for creating a new task
#[derive(Debug, Clone, Default)]
pub struct CreateTask {
    /// Task title
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Initial status (default: todo)
    pub status: Option<TaskStatus>,

    /// Initial priority (default: medium)
    pub priority: Option<TaskPriority>,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// Creating user
    pub created_by: Uuid,

    /// Optional assignee
    pub assignee_id: Option<Uuid>,

    /// Optional parent task
    pub parent_id: Option<Uuid>,

    /// Tag names to attach (created on demand)
    pub tag_names: Vec<String>,

    /// Collaborator user IDs to attach
    pub collaborator_ids: Vec<Uuid>,
}

/// Input for updating a task
///
/// `None` means "leave the field unchanged". Tag and collaborator sets are
/// replaced wholesale when supplied.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub tag_names: Option<Vec<String>>,
    pub collaborator_ids: Option<Vec<Uuid>>,
}

/// Filter criteria for task listings
///
/// Criteria combine with AND; an empty set / `None` leaves that criterion
/// unapplied. Tag filtering matches tasks carrying at least one of the
/// requested tags. Date bounds are inclusive.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Match any of these statuses
    pub statuses: Vec<TaskStatus>,

    /// Match any of these priorities
    pub priorities: Vec<TaskPriority>,

    /// Match any of these assignees
    pub assignee_ids: Vec<Uuid>,

    /// Match tasks carrying at least one of these tag names
    pub tags: Vec<String>,

    /// Created-at lower bound (inclusive)
    pub created_from: Option<DateTime<Utc>>,

    /// Created-at upper bound (inclusive)
    pub created_to: Option<DateTime<Utc>>,

    /// Due-date lower bound (inclusive)
    pub due_from: Option<DateTime<Utc>>,

    /// Due-date upper bound (inclusive)
    pub due_to: Option<DateTime<Utc>>,

    /// Page size
    pub limit: i64,

    /// Page offset
    pub offset: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            priorities: Vec::new(),
            assignee_ids: Vec::new(),
            tags: Vec::new(),
            created_from: None,
            created_to: None,
            due_from: None,
            due_to: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl TaskFilter {
    /// Builds the parameterized SELECT for this filter
    ///
    /// Placeholder numbering follows the bind order used by [`Task::list`]:
    /// statuses, priorities, assignee ids, tags, created_from, created_to,
    /// due_from, due_to, then limit and offset. Ordering is fixed to
    /// `created_at DESC, id` so identical state always yields identical
    /// result order.
    pub fn build_sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM tasks", TASK_COLUMNS);
        let mut conditions: Vec<String> = Vec::new();
        let mut n = 0usize;

        let next = |n: &mut usize| {
            *n += 1;
            *n
        };

        if !self.statuses.is_empty() {
            conditions.push(format!("status = ANY(${})", next(&mut n)));
        }
        if !self.priorities.is_empty() {
            conditions.push(format!("priority = ANY(${})", next(&mut n)));
        }
        if !self.assignee_ids.is_empty() {
            conditions.push(format!("assignee_id = ANY(${})", next(&mut n)));
        }
        if !self.tags.is_empty() {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM task_tags tt \
                 JOIN tags tg ON tg.id = tt.tag_id \
                 WHERE tt.task_id = tasks.id AND tg.name = ANY(${}))",
                next(&mut n)
            ));
        }
        if self.created_from.is_some() {
            conditions.push(format!("created_at >= ${}", next(&mut n)));
        }
        if self.created_to.is_some() {
            conditions.push(format!("created_at <= ${}", next(&mut n)));
        }
        if self.due_from.is_some() {
            conditions.push(format!("due_date >= ${}", next(&mut n)));
        }
        if self.due_to.is_some() {
            conditions.push(format!("due_date <= ${}", next(&mut n)));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql.push_str(&format!(
            " ORDER BY created_at DESC, id LIMIT ${} OFFSET ${}",
            next(&mut n),
            next(&mut n)
        ));

        sql
    }
}

/// A single detected field change, recorded as one `updated` event
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldChange {
    field: &'static str,
    old_value: Option<String>,
    new_value: Option<String>,
}

impl Task {
    /// Returns the typed status, falling back to `Todo` for unknown values
    pub fn status(&self) -> TaskStatus {
        TaskStatus::parse(&self.status).unwrap_or(TaskStatus::Todo)
    }

    /// Creates a task together with its tag/collaborator links and the
    /// `created` event, all in one transaction
    ///
    /// # Errors
    ///
    /// - [`TaskError::ParentNotFound`] when `parent_id` references a missing task
    /// - [`TaskError::Database`] on store failures (including FK violations
    ///   for a missing assignee or collaborator)
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, TaskError> {
        let mut tx = pool.begin().await?;

        if let Some(parent_id) = data.parent_id {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = $1")
                .bind(parent_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(TaskError::ParentNotFound(parent_id));
            }
        }

        let status = data.status.unwrap_or(TaskStatus::Todo);
        let priority = data.priority.unwrap_or(TaskPriority::Medium);

        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (title, description, status, priority, due_date, \
             created_by, assignee_id, parent_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(&data.title)
        .bind(&data.description)
        .bind(status.as_str())
        .bind(priority.as_str())
        .bind(data.due_date)
        .bind(data.created_by)
        .bind(data.assignee_id)
        .bind(data.parent_id)
        .fetch_one(&mut *tx)
        .await?;

        if !data.tag_names.is_empty() {
            set_tags(&mut tx, task.id, &data.tag_names).await?;
        }
        if !data.collaborator_ids.is_empty() {
            set_collaborators(&mut tx, task.id, &data.collaborator_ids).await?;
        }

        TaskEvent::append(
            &mut tx,
            AppendEvent {
                task_id: task.id,
                user_id: Some(data.created_by),
                event_type: EventType::Created,
                field: None,
                old_value: None,
                new_value: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(task_id = %task.id, "Task created");
        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists tasks matching the filter
    ///
    /// Bind order must match [`TaskFilter::build_sql`] placeholder order.
    pub async fn list(pool: &PgPool, filter: &TaskFilter) -> Result<Vec<Self>, sqlx::Error> {
        let sql = filter.build_sql();
        let mut query = sqlx::query_as::<_, Task>(&sql);

        if !filter.statuses.is_empty() {
            let statuses: Vec<&str> = filter.statuses.iter().map(|s| s.as_str()).collect();
            query = query.bind(statuses);
        }
        if !filter.priorities.is_empty() {
            let priorities: Vec<&str> = filter.priorities.iter().map(|p| p.as_str()).collect();
            query = query.bind(priorities);
        }
        if !filter.assignee_ids.is_empty() {
            query = query.bind(filter.assignee_ids.clone());
        }
        if !filter.tags.is_empty() {
            query = query.bind(filter.tags.clone());
        }
        if let Some(created_from) = filter.created_from {
            query = query.bind(created_from);
        }
        if let Some(created_to) = filter.created_to {
            query = query.bind(created_to);
        }
        if let Some(due_from) = filter.due_from {
            query = query.bind(due_from);
        }
        if let Some(due_to) = filter.due_to {
            query = query.bind(due_to);
        }
        query = query.bind(filter.limit).bind(filter.offset);

        query.fetch_all(pool).await
    }

    /// Applies a partial update and appends one `updated` event per changed
    /// field, all in one transaction
    ///
    /// The row is locked for the duration so concurrent updates serialize
    /// and old/new values in events are accurate.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] when the task does not exist
    /// - [`TaskError::ParentNotFound`] / [`TaskError::ParentCycle`] for bad parent links
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTask,
        actor: Uuid,
    ) -> Result<Self, TaskError> {
        let mut tx = pool.begin().await?;

        let current = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1 FOR UPDATE",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(TaskError::NotFound(id))?;

        let mut changes: Vec<FieldChange> = Vec::new();

        let title = match data.title {
            Some(title) if title != current.title => {
                changes.push(FieldChange {
                    field: "title",
                    old_value: Some(current.title.clone()),
                    new_value: Some(title.clone()),
                });
                title
            }
            _ => current.title.clone(),
        };

        let description = match data.description {
            Some(description) if Some(&description) != current.description.as_ref() => {
                changes.push(FieldChange {
                    field: "description",
                    old_value: current.description.clone(),
                    new_value: Some(description.clone()),
                });
                Some(description)
            }
            _ => current.description.clone(),
        };

        let status = match data.status {
            Some(status) if status.as_str() != current.status => {
                changes.push(FieldChange {
                    field: "status",
                    old_value: Some(current.status.clone()),
                    new_value: Some(status.as_str().to_string()),
                });
                status.as_str().to_string()
            }
            _ => current.status.clone(),
        };

        let priority = match data.priority {
            Some(priority) if priority.as_str() != current.priority => {
                changes.push(FieldChange {
                    field: "priority",
                    old_value: Some(current.priority.clone()),
                    new_value: Some(priority.as_str().to_string()),
                });
                priority.as_str().to_string()
            }
            _ => current.priority.clone(),
        };

        let due_date = match data.due_date {
            Some(due_date) if Some(due_date) != current.due_date => {
                changes.push(FieldChange {
                    field: "due_date",
                    old_value: current.due_date.map(|d| d.to_rfc3339()),
                    new_value: Some(due_date.to_rfc3339()),
                });
                Some(due_date)
            }
            _ => current.due_date,
        };

        let assignee_id = match data.assignee_id {
            Some(assignee_id) if Some(assignee_id) != current.assignee_id => {
                changes.push(FieldChange {
                    field: "assignee_id",
                    old_value: current.assignee_id.map(|u| u.to_string()),
                    new_value: Some(assignee_id.to_string()),
                });
                Some(assignee_id)
            }
            _ => current.assignee_id,
        };

        let parent_id = match data.parent_id {
            Some(parent_id) if Some(parent_id) != current.parent_id => {
                ensure_valid_parent(&mut tx, id, parent_id).await?;
                changes.push(FieldChange {
                    field: "parent_id",
                    old_value: current.parent_id.map(|u| u.to_string()),
                    new_value: Some(parent_id.to_string()),
                });
                Some(parent_id)
            }
            _ => current.parent_id,
        };

        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET title = $2, description = $3, status = $4, priority = $5, \
             due_date = $6, assignee_id = $7, parent_id = $8, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(&title)
        .bind(&description)
        .bind(&status)
        .bind(&priority)
        .bind(due_date)
        .bind(assignee_id)
        .bind(parent_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(tag_names) = data.tag_names {
            let old_names = tag_names_for_task(&mut tx, id).await?;
            let mut old_sorted = old_names.clone();
            let mut new_sorted = tag_names.clone();
            old_sorted.sort();
            new_sorted.sort();
            if old_sorted != new_sorted {
                set_tags(&mut tx, id, &tag_names).await?;
                changes.push(FieldChange {
                    field: "tags",
                    old_value: Some(old_names.join(",")),
                    new_value: Some(tag_names.join(",")),
                });
            }
        }

        if let Some(collaborator_ids) = data.collaborator_ids {
            let old_ids = collaborator_ids_for_task(&mut tx, id).await?;
            let mut old_sorted = old_ids.clone();
            let mut new_sorted = collaborator_ids.clone();
            old_sorted.sort();
            new_sorted.sort();
            if old_sorted != new_sorted {
                set_collaborators(&mut tx, id, &collaborator_ids).await?;
                changes.push(FieldChange {
                    field: "collaborators",
                    old_value: Some(join_ids(&old_ids)),
                    new_value: Some(join_ids(&collaborator_ids)),
                });
            }
        }

        for change in &changes {
            TaskEvent::append(
                &mut tx,
                AppendEvent {
                    task_id: id,
                    user_id: Some(actor),
                    event_type: EventType::Updated,
                    field: Some(change.field.to_string()),
                    old_value: change.old_value.clone(),
                    new_value: change.new_value.clone(),
                },
            )
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(task_id = %id, changed_fields = changes.len(), "Task updated");
        Ok(task)
    }

    /// Hard-deletes a task
    ///
    /// Tag links, collaborator links, dependency edges in both directions,
    /// and events go with it via FK cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns the task's tags
    pub async fn tags(pool: &PgPool, id: Uuid) -> Result<Vec<Tag>, sqlx::Error> {
        Tag::for_task(pool, id).await
    }

    /// Returns the task's collaborator user IDs
    pub async fn collaborator_ids(pool: &PgPool, id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM task_collaborators WHERE task_id = $1 ORDER BY user_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

/// Checks a proposed parent link: the parent must exist and walking its
/// ancestor chain must not reach the task itself.
async fn ensure_valid_parent(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
    parent_id: Uuid,
) -> Result<(), TaskError> {
    if parent_id == task_id {
        return Err(TaskError::ParentCycle);
    }

    let mut cursor = Some(parent_id);
    let mut first = true;
    while let Some(current) = cursor {
        let row: Option<(Option<Uuid>,)> =
            sqlx::query_as("SELECT parent_id FROM tasks WHERE id = $1")
                .bind(current)
                .fetch_optional(&mut **tx)
                .await?;

        let parent = match row {
            Some((parent,)) => parent,
            None if first => return Err(TaskError::ParentNotFound(parent_id)),
            None => None,
        };
        first = false;

        if parent == Some(task_id) {
            return Err(TaskError::ParentCycle);
        }
        cursor = parent;
    }

    Ok(())
}

async fn tag_names_for_task(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tg.name FROM task_tags tt \
         JOIN tags tg ON tg.id = tt.tag_id \
         WHERE tt.task_id = $1 ORDER BY tg.name",
    )
    .bind(task_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

async fn collaborator_ids_for_task(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT user_id FROM task_collaborators WHERE task_id = $1 ORDER BY user_id",
    )
    .bind(task_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Replaces the task's tag set, creating tags on demand
async fn set_tags(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
    tag_names: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM task_tags WHERE task_id = $1")
        .bind(task_id)
        .execute(&mut **tx)
        .await?;

    for name in tag_names {
        let tag = Tag::get_or_create(&mut **tx, name).await?;
        sqlx::query(
            "INSERT INTO task_tags (task_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(tag.id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Replaces the task's collaborator set
async fn set_collaborators(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: Uuid,
    user_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM task_collaborators WHERE task_id = $1")
        .bind(task_id)
        .execute(&mut **tx)
        .await?;

    for user_id in user_ids {
        sqlx::query(
            "INSERT INTO task_collaborators (task_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
