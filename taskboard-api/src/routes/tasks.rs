/// Task endpoints: CRUD, filtered listings, bulk updates, and dependencies
///
/// # Endpoints
///
/// - `GET    /tasks/` - Filtered, paginated listing
/// - `POST   /tasks/` - Create a task
/// - `GET    /tasks/:id` - Fetch one task
/// - `PUT    /tasks/:id` / `PATCH /tasks/:id` - Partial update
/// - `DELETE /tasks/:id` - Hard delete
/// - `POST   /tasks/bulk-update` - Batch updates
/// - `POST   /tasks/:task_id/dependencies/:depends_on_id` - Add edge
/// - `GET    /tasks/:task_id/dependencies` - List direct dependencies
///
/// # Filtering
///
/// `GET /tasks/` accepts repeatable `status`, `priority`, `assignee_id`,
/// and `tag` parameters plus `created_from`, `created_to`, `due_from`,
/// `due_to` (RFC 3339) and `limit`/`offset`. Criteria combine with AND;
/// a task matches the tag criterion when it carries at least one of the
/// requested tags.

use crate::{
    app::AppState,
    config::LimitsConfig,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use taskboard_shared::auth::{context::AuthContext, rbac};
use taskboard_shared::models::{
    dependency::TaskDependency,
    tag::Tag,
    task::{CreateTask, Task, TaskFilter, TaskPriority, TaskStatus, UpdateTask},
};
use uuid::Uuid;
use validator::Validate;

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Task title
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Initial status (default: todo)
    pub status: Option<String>,

    /// Initial priority (default: medium)
    pub priority: Option<String>,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// Optional assignee
    pub assignee_id: Option<Uuid>,

    /// Optional parent task
    pub parent_id: Option<Uuid>,

    /// Tag names to attach (created on demand)
    #[serde(default)]
    pub tag_names: Vec<String>,

    /// Collaborator user IDs
    #[serde(default)]
    pub collaborator_ids: Vec<Uuid>,
}

/// Update task request
///
/// Omitted fields are left unchanged. Tag and collaborator sets are
/// replaced wholesale when supplied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub tag_names: Option<Vec<String>>,
    pub collaborator_ids: Option<Vec<Uuid>>,
}

/// Bulk update request
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    /// Per-task updates
    pub items: Vec<BulkUpdateItem>,
}

/// One item in a bulk update
#[derive(Debug, Deserialize)]
pub struct BulkUpdateItem {
    /// Target task
    pub id: Uuid,

    /// Fields to update
    #[serde(flatten)]
    pub changes: UpdateTaskRequest,
}

/// Task response, including tags and collaborators
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub assignee_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub collaborator_ids: Vec<Uuid>,
}

/// Dependency response
#[derive(Debug, Serialize)]
pub struct DependencyResponse {
    /// The blocked task
    pub task_id: Uuid,

    /// The task it depends on
    pub depends_on_id: Uuid,
}

async fn task_response(pool: &PgPool, task: Task) -> Result<TaskResponse, sqlx::Error> {
    let tags = Task::tags(pool, task.id).await?;
    let collaborator_ids = Task::collaborator_ids(pool, task.id).await?;

    Ok(TaskResponse {
        id: task.id,
        title: task.title,
        description: task.description,
        status: task.status,
        priority: task.priority,
        due_date: task.due_date,
        created_by: task.created_by,
        assignee_id: task.assignee_id,
        parent_id: task.parent_id,
        created_at: task.created_at,
        updated_at: task.updated_at,
        tags,
        collaborator_ids,
    })
}

fn parse_status(s: &str) -> Result<TaskStatus, ApiError> {
    TaskStatus::parse(s)
        .ok_or_else(|| ApiError::invalid_field("status", format!("Unknown status: {}", s)))
}

fn parse_priority(s: &str) -> Result<TaskPriority, ApiError> {
    TaskPriority::parse(s)
        .ok_or_else(|| ApiError::invalid_field("priority", format!("Unknown priority: {}", s)))
}

fn parse_datetime(field: &str, s: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::invalid_field(field, format!("Invalid RFC 3339 datetime: {}", s))
        })
}

/// Parses the raw query pairs of `GET /tasks/` into a [`TaskFilter`]
///
/// Repeatable keys accumulate into sets. Unknown enum values, malformed
/// UUIDs/datetimes, and bad numbers are validation errors; unknown keys
/// are ignored.
pub fn parse_filter(
    params: &[(String, String)],
    limits: &LimitsConfig,
) -> Result<TaskFilter, ApiError> {
    let mut filter = TaskFilter {
        limit: limits.default_page_size,
        ..TaskFilter::default()
    };

    for (key, value) in params {
        match key.as_str() {
            "status" => filter.statuses.push(parse_status(value)?),
            "priority" => filter.priorities.push(parse_priority(value)?),
            "assignee_id" => filter.assignee_ids.push(value.parse::<Uuid>().map_err(
                |_| ApiError::invalid_field("assignee_id", format!("Invalid UUID: {}", value)),
            )?),
            "tag" => filter.tags.push(value.clone()),
            "created_from" => filter.created_from = Some(parse_datetime("created_from", value)?),
            "created_to" => filter.created_to = Some(parse_datetime("created_to", value)?),
            "due_from" => filter.due_from = Some(parse_datetime("due_from", value)?),
            "due_to" => filter.due_to = Some(parse_datetime("due_to", value)?),
            "limit" => {
                let limit = value.parse::<i64>().map_err(|_| {
                    ApiError::invalid_field("limit", format!("Invalid number: {}", value))
                })?;
                if limit < 1 {
                    return Err(ApiError::invalid_field("limit", "Must be at least 1"));
                }
                filter.limit = limit.min(limits.max_page_size);
            }
            "offset" => {
                let offset = value.parse::<i64>().map_err(|_| {
                    ApiError::invalid_field("offset", format!("Invalid number: {}", value))
                })?;
                if offset < 0 {
                    return Err(ApiError::invalid_field("offset", "Must not be negative"));
                }
                filter.offset = offset;
            }
            _ => {}
        }
    }

    Ok(filter)
}

fn to_update(req: UpdateTaskRequest) -> Result<UpdateTask, ApiError> {
    Ok(UpdateTask {
        title: req.title,
        description: req.description,
        status: req.status.as_deref().map(parse_status).transpose()?,
        priority: req.priority.as_deref().map(parse_priority).transpose()?,
        due_date: req.due_date,
        assignee_id: req.assignee_id,
        parent_id: req.parent_id,
        tag_names: req.tag_names,
        collaborator_ids: req.collaborator_ids,
    })
}

/// Parses every item of a bulk update up front, so a bad field value in
/// any item rejects the batch before a single task is touched
fn parse_bulk_items(items: Vec<BulkUpdateItem>) -> Result<Vec<(Uuid, UpdateTask)>, ApiError> {
    items
        .into_iter()
        .map(|item| Ok((item.id, to_update(item.changes)?)))
        .collect()
}

/// Create a task
///
/// Appends one `created` event in the same transaction.
///
/// # Errors
///
/// - `404 Not Found`: Parent task does not exist
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    req.validate()?;

    let status = req.status.as_deref().map(parse_status).transpose()?;
    let priority = req.priority.as_deref().map(parse_priority).transpose()?;

    let task = Task::create(
        &state.db,
        CreateTask {
            title: req.title,
            description: req.description,
            status,
            priority,
            due_date: req.due_date,
            created_by: auth.user_id,
            assignee_id: req.assignee_id,
            parent_id: req.parent_id,
            tag_names: req.tag_names,
            collaborator_ids: req.collaborator_ids,
        },
    )
    .await?;

    let response = task_response(&state.db, task).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch one task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", id)))?;

    Ok(Json(task_response(&state.db, task).await?))
}

/// Filtered, paginated task listing
///
/// Supplying no filters returns all tasks, ordered by creation time
/// descending with the task ID as tie-breaker.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let filter = parse_filter(&params, &state.config.limits)?;
    let tasks = Task::list(&state.db, &filter).await?;

    let mut responses = Vec::with_capacity(tasks.len());
    for task in tasks {
        responses.push(task_response(&state.db, task).await?);
    }

    Ok(Json(responses))
}

/// Partial task update
///
/// Appends one `updated` event per changed field, in the same transaction
/// as the update. Restricted to admin/manager roles and the task's own
/// creator or assignee.
///
/// # Errors
///
/// - `403 Forbidden`: Caller may not modify this task
/// - `404 Not Found`: Task (or new parent) does not exist
/// - `409 Conflict`: Parent link would form a cycle
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let task = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", id)))?;

    if !rbac::can_update_task(auth.user_id, auth.role, &task) {
        return Err(ApiError::Forbidden(
            "Not allowed to update this task".to_string(),
        ));
    }

    let update = to_update(req)?;
    let task = Task::update(&state.db, id, update, auth.user_id).await?;

    Ok(Json(task_response(&state.db, task).await?))
}

/// Hard-delete a task
///
/// Restricted to admin/manager roles and the task's creator. Tag links,
/// dependency edges, and events cascade with the row.
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let task = Task::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", id)))?;

    if !rbac::can_delete_task(auth.user_id, auth.role, &task) {
        return Err(ApiError::Forbidden(
            "Not allowed to delete this task".to_string(),
        ));
    }

    Task::delete(&state.db, id).await?;

    tracing::info!(task_id = %id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Batch field updates across multiple tasks
///
/// All items are validated before any update runs; a bad field value
/// anywhere in the batch fails the request with no task modified. Items
/// referencing missing tasks, or tasks the caller may not modify, are
/// skipped; the updated tasks are returned.
pub async fn bulk_update_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<BulkUpdateRequest>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let items = parse_bulk_items(req.items)?;

    let mut updated = Vec::new();
    for (id, update) in items {
        let task = match Task::find_by_id(&state.db, id).await? {
            Some(task) => task,
            None => continue,
        };
        if !rbac::can_update_task(auth.user_id, auth.role, &task) {
            continue;
        }

        let task = Task::update(&state.db, id, update, auth.user_id).await?;
        updated.push(task_response(&state.db, task).await?);
    }

    Ok(Json(updated))
}

/// Add a dependency edge: `task_id` becomes blocked on `depends_on_id`
///
/// The cycle check and the insert run in one transaction; on success a
/// `dependency_added` event is appended to the dependent task.
///
/// # Errors
///
/// - `404 Not Found`: Either task does not exist
/// - `409 Conflict`: Self-dependency, duplicate edge, or cycle
pub async fn add_dependency(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((task_id, depends_on_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<(StatusCode, Json<DependencyResponse>)> {
    let edge = TaskDependency::add(&state.db, task_id, depends_on_id, auth.user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(DependencyResponse {
            task_id: edge.task_id,
            depends_on_id: edge.depends_on_id,
        }),
    ))
}

/// List the task IDs a task directly depends on, in insertion order
pub async fn list_dependencies(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Uuid>>> {
    let ids = TaskDependency::list_for_task(&state.db, task_id).await?;
    Ok(Json(ids))
}
