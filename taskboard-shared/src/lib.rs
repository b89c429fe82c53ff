//! # Taskboard Shared Library
//!
//! Data layer and auth utilities shared by the Taskboard API server and
//! any future tooling.
//!
//! - `models`: Database models and query operations
//! - `auth`: Password hashing, JWT tokens, RBAC
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
