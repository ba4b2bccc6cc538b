//! Backoffice Server Library
//!
//! This crate provides the server side of the Backoffice service:
//! configuration, database drivers, authentication and user management
//! services, and the HTTP API.

pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod models;
pub mod services;

pub use app::Application;
pub use config::AppConfig;
