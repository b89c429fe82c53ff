/// Workload analytics aggregation
///
/// Per-assignee task counts with an overdue breakdown. A task is overdue
/// when its due date is strictly before now and its status is not yet
/// `done`; tasks already done are never overdue. Users with no assigned
/// tasks do not appear at all.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Per-assignee workload summary
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskDistribution {
    /// The assignee
    pub user_id: Uuid,

    /// Tasks assigned to this user
    pub total_tasks: i64,

    /// Assigned tasks past due and not done
    pub overdue_tasks: i64,
}

/// Computes the workload distribution across all assignees
///
/// Only users assigned to at least one task appear. Ordered by user_id
/// ascending so identical state always yields identical output.
pub async fn task_distribution(pool: &PgPool) -> Result<Vec<TaskDistribution>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaskDistribution>(
        r#"
        SELECT assignee_id AS user_id,
               COUNT(*) AS total_tasks,
               COUNT(*) FILTER (WHERE due_date < NOW() AND status <> 'done') AS overdue_tasks
        FROM tasks
        WHERE assignee_id IS NOT NULL
        GROUP BY assignee_id
        ORDER BY assignee_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
