#![forbid(unsafe_code)]

//! Call-center monitoring backend: polls the Trio Enterprise API, caches
//! results in `SQLite`, evaluates queue health and alerts, and serves a REST
//! API for the dashboard.

pub mod api;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod models;
pub mod persistence;
pub mod poller;
pub mod upstream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
