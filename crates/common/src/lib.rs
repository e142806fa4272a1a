//! Shared utilities, configuration, and error handling for Roster
//!
//! This crate provides common functionality used across the Roster workspace:
//! - Configuration management following 12-factor principles
//! - Error types and their HTTP mapping
//! - Repository error classification and transaction-scoped connections

pub mod config;
pub mod db;
pub mod error;

pub use config::{Config, LogFormat};
pub use db::{AbandonOnDrop, ConnectionScope, RepositoryError, ScopedConnection, SharedTransaction};
pub use error::{Error, Result};
