//! # Taskboard API Server
//!
//! HTTP surface of the task tracker. The binary in `main.rs` is a thin
//! shell around [`app::build_router`].
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration loaded from the environment
//! - `error`: Error taxonomy and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
