//! Core module - storage session, errors and ambient configuration

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod project;

pub use config::Config;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use project::{Project, ProjectError};
