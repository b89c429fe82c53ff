/// Database models for Taskboard
///
/// This module contains all database models and their query operations.
///
/// # Models
///
/// - `user`: User accounts with roles
/// - `task`: Tasks, the filter query engine, and field-level change tracking
/// - `tag`: Tags and task-tag associations
/// - `dependency`: Directed depends-on edges with cycle rejection
/// - `task_event`: Append-only change log and the timeline query
/// - `analytics`: Per-assignee workload aggregation
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::user::{CreateUser, User, UserRole};
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     full_name: Some("Jo Harper".to_string()),
///     role: UserRole::Member,
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```

pub mod analytics;
pub mod dependency;
pub mod tag;
pub mod task;
pub mod task_event;
pub mod user;
