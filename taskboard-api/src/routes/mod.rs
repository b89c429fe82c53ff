/// Route handlers, one module per resource
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, token, me)
/// - `tasks`: Task CRUD, filtering, bulk updates, dependencies
/// - `analytics`: Workload distribution and event timeline

pub mod analytics;
pub mod auth;
pub mod health;
pub mod tasks;
